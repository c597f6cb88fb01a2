use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Anonymous,
    Credentialed { email: String },
}

/// The identity currently reported by the session store.
///
/// A session is either anonymous (no email) or credentialed (has an email);
/// the enum makes any other combination unrepresentable. Sessions are only
/// ever built by a [`SessionStore`](crate::backend::SessionStore).
#[derive(Debug, Clone)]
pub struct Session {
    uid: String,
    id_token: Secret<String>,
    identity: Identity,
}

impl Session {
    pub fn anonymous(uid: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            id_token: Secret::new(id_token.into()),
            identity: Identity::Anonymous,
        }
    }

    pub fn credentialed(
        uid: impl Into<String>,
        id_token: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            id_token: Secret::new(id_token.into()),
            identity: Identity::Credentialed {
                email: email.into(),
            },
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn id_token(&self) -> &Secret<String> {
        &self.id_token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn email(&self) -> Option<&str> {
        match &self.identity {
            Identity::Credentialed { email } => Some(email),
            Identity::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.identity, Identity::Anonymous)
    }

    /// The same user carrying a refreshed token.
    pub fn with_token(&self, id_token: impl Into<String>) -> Self {
        Self {
            uid: self.uid.clone(),
            id_token: Secret::new(id_token.into()),
            identity: self.identity.clone(),
        }
    }
}

// A rotated token is a new session value, so watchers see the refresh.
// Compare `uid` to ask whether the user changed.
impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.identity == other.identity
            && self.id_token.expose_secret() == other.id_token.expose_secret()
    }
}

impl Eq for Session {}

/// The configured administrator address, normalised for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminEmail(String);

impl AdminEmail {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalised = raw.trim().to_ascii_lowercase();
        if normalised.is_empty() || !normalised.contains('@') {
            return None;
        }
        Some(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// AdminStatus: true iff the session is credentialed with this address.
    pub fn matches(&self, session: Option<&Session>) -> bool {
        session
            .and_then(Session::email)
            .is_some_and(|email| email.trim().eq_ignore_ascii_case(&self.0))
    }
}

/// Bearer value for backend calls made on behalf of a session.
pub fn bearer(session: &Session) -> &str {
    session.id_token.expose_secret()
}
