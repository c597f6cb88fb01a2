use super::{ErrorEnvelope, http_client};
use crate::backend::subscription::Fanout;
use crate::backend::{SessionFeed, SessionStore};
use crate::config::FirebaseSettings;
use crate::error::AuthError;
use crate::models::Session;
use crate::observability::TracedRequestExt;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    #[serde(default)]
    local_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Secure Token API reply; unlike Identity Toolkit it uses snake_case.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Id tokens are renewed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when a response omits `expiresIn`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

struct Renewal {
    refresh_token: Secret<String>,
    expires_at: Instant,
}

#[derive(Default)]
struct SessionState {
    current: Option<Session>,
    renewal: Option<Renewal>,
    subscribers: Fanout<Option<Session>>,
}

/// Session store backed by the Identity Toolkit REST API.
///
/// The REST API is stateless, so the current session lives here and
/// transitions are pushed to subscribers locally. Sign-out never leaves the
/// process. Id tokens are renewed through the Secure Token API shortly
/// before they expire, and the rotated session is pushed like any other
/// transition.
pub struct FirebaseSessionStore {
    client: Client,
    settings: FirebaseSettings,
    state: Mutex<SessionState>,
    renewing: tokio::sync::Mutex<()>,
}

impl FirebaseSessionStore {
    pub fn new(settings: FirebaseSettings) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(http_client(&settings)?, settings))
    }

    /// Shares an existing HTTP client, one store per signed-in visitor.
    pub fn with_client(client: Client, settings: FirebaseSettings) -> Self {
        Self {
            client,
            settings,
            state: Mutex::new(SessionState::default()),
            renewing: tokio::sync::Mutex::new(()),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{}",
            self.settings.identity_url.trim_end_matches('/'),
            method
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = self.endpoint(method);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.settings.api_key.expose_secret())])
            .with_trace_context()
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(method = %method, "Identity provider request failed: {}", e);
                AuthError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
            let err = map_auth_error(status, &envelope);
            tracing::warn!(method = %method, status = %status, code = %envelope.code(), "Identity provider rejected request");
            return Err(err);
        }

        response.json::<T>().await.map_err(AuthError::from)
    }

    fn establish(
        &self,
        session: Session,
        refresh_token: Option<String>,
        expires_in: Option<&str>,
    ) -> Session {
        let mut state = self.state.lock();
        state.current = Some(session.clone());
        state.renewal = refresh_token.map(|token| Renewal {
            refresh_token: Secret::new(token),
            expires_at: expiry(expires_in),
        });
        let current = state.current.clone();
        state.subscribers.send(&current);
        session
    }

    /// Exchanges the refresh token for a new id token and pushes the
    /// rotated session. Returns the current session unchanged when there is
    /// nothing to renew, or when `only_if_due` is set and the token is still
    /// comfortably valid.
    async fn renew(&self, only_if_due: bool) -> Result<Option<Session>, AuthError> {
        let _renewing = self.renewing.lock().await;

        let (session, refresh_token) = {
            let state = self.state.lock();
            match (&state.current, &state.renewal) {
                (Some(session), Some(renewal)) => {
                    if only_if_due && Instant::now() + REFRESH_MARGIN < renewal.expires_at {
                        return Ok(state.current.clone());
                    }
                    (session.clone(), renewal.refresh_token.clone())
                }
                _ => return Ok(state.current.clone()),
            }
        };

        let url = format!(
            "{}/v1/token",
            self.settings.token_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.settings.api_key.expose_secret())])
            .with_trace_context()
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(uid = %session.uid(), "Token refresh request failed: {}", e);
                AuthError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
            tracing::warn!(uid = %session.uid(), status = %status, code = %envelope.code(), "Token refresh rejected");
            return Err(map_auth_error(status, &envelope));
        }
        let renewed: RefreshResponse = response.json().await.map_err(AuthError::from)?;

        let mut state = self.state.lock();
        // Signed out or replaced while the refresh was in flight.
        if state.current.as_ref().map(Session::uid) != Some(session.uid()) {
            return Ok(state.current.clone());
        }
        let rotated = session.with_token(renewed.id_token);
        state.current = Some(rotated.clone());
        state.renewal = Some(Renewal {
            refresh_token: Secret::new(renewed.refresh_token),
            expires_at: expiry(renewed.expires_in.as_deref()),
        });
        let current = state.current.clone();
        state.subscribers.send(&current);

        tracing::info!(uid = %rotated.uid(), "Id token refreshed");
        Ok(Some(rotated))
    }
}

fn expiry(expires_in: Option<&str>) -> Instant {
    let lifetime = expires_in
        .and_then(|secs| secs.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME);
    let now = Instant::now();
    now.checked_add(lifetime)
        .unwrap_or(now + DEFAULT_TOKEN_LIFETIME)
}

fn map_auth_error(status: StatusCode, envelope: &ErrorEnvelope) -> AuthError {
    match envelope.code() {
        "EMAIL_NOT_FOUND"
        | "INVALID_PASSWORD"
        | "INVALID_LOGIN_CREDENTIALS"
        | "INVALID_EMAIL"
        | "MISSING_PASSWORD"
        | "INVALID_CUSTOM_TOKEN"
        | "CREDENTIAL_MISMATCH" => AuthError::InvalidCredential,
        "USER_DISABLED" => AuthError::Disabled,
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            AuthError::InvalidCredential
        }
        _ if status.is_server_error() => AuthError::Network(format!("identity provider returned {}", status)),
        code => AuthError::Unexpected(format!("{} ({})", code, status)),
    }
}

#[async_trait]
impl SessionStore for FirebaseSessionStore {
    async fn sign_in_with_credential(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<Session, AuthError> {
        let response: SignInResponse = self
            .call(
                "signInWithPassword",
                json!({
                    "email": email,
                    "password": password.expose_secret(),
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let uid = response
            .local_id
            .ok_or_else(|| AuthError::Unexpected("sign-in response without localId".to_string()))?;
        let email = response.email.unwrap_or_else(|| email.to_string());

        tracing::info!(uid = %uid, "Credential sign-in succeeded");
        Ok(self.establish(
            Session::credentialed(uid, response.id_token, email),
            response.refresh_token,
            response.expires_in.as_deref(),
        ))
    }

    async fn sign_in_with_custom_token(
        &self,
        token: &Secret<String>,
    ) -> Result<Session, AuthError> {
        let response: SignInResponse = self
            .call(
                "signInWithCustomToken",
                json!({
                    "token": token.expose_secret(),
                    "returnSecureToken": true,
                }),
            )
            .await?;

        // The custom-token response carries no profile; look it up.
        let lookup: LookupResponse = self
            .call("lookup", json!({ "idToken": response.id_token }))
            .await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::Unexpected("lookup returned no user".to_string()))?;

        tracing::info!(uid = %user.local_id, "Custom token sign-in succeeded");
        let session = match user.email {
            Some(email) => Session::credentialed(user.local_id, response.id_token, email),
            None => Session::anonymous(user.local_id, response.id_token),
        };
        Ok(self.establish(
            session,
            response.refresh_token,
            response.expires_in.as_deref(),
        ))
    }

    async fn sign_in_anonymously(&self) -> Result<Session, AuthError> {
        let response: SignInResponse = self
            .call("signUp", json!({ "returnSecureToken": true }))
            .await?;

        let uid = response.local_id.ok_or_else(|| {
            AuthError::Unexpected("anonymous sign-up response without localId".to_string())
        })?;

        tracing::info!(uid = %uid, "Anonymous sign-in succeeded");
        Ok(self.establish(
            Session::anonymous(uid, response.id_token),
            response.refresh_token,
            response.expires_in.as_deref(),
        ))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock();
        state.renewal = None;
        if state.current.take().is_some() {
            state.subscribers.send(&None);
        }
        Ok(())
    }

    fn subscribe(&self) -> SessionFeed {
        let mut state = self.state.lock();
        let current = state.current.clone();
        state.subscribers.add(Some(current))
    }

    fn current(&self) -> Option<Session> {
        self.state.lock().current.clone()
    }

    async fn fresh_session(&self) -> Result<Option<Session>, AuthError> {
        self.renew(true).await
    }

    async fn refresh_session(&self) -> Result<Option<Session>, AuthError> {
        self.renew(false).await
    }
}
