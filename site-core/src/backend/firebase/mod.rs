//! Firebase REST adapters: Identity Toolkit for sessions, Firestore for posts.

mod auth;
mod documents;
mod firestore;

pub use auth::FirebaseSessionStore;
pub use firestore::FirestoreContentStore;

use crate::config::FirebaseSettings;
use serde::Deserialize;
use std::time::Duration;

/// Error envelope shared by both REST APIs.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl ErrorEnvelope {
    /// Identity Toolkit puts a code first in `message`, e.g.
    /// `TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account ...`.
    fn code(&self) -> &str {
        self.error
            .message
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
    }
}

pub(crate) fn http_client(settings: &FirebaseSettings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
}
