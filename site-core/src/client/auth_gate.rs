use super::view::{GateState, ViewMode, view_mode};
use crate::backend::{Flow, SessionStore, Subscription};
use crate::config::SiteSettings;
use crate::error::AuthError;
use crate::models::{AdminEmail, Session};
use parking_lot::Mutex;
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
pub struct GateOptions {
    /// Sign in anonymously when the first notification reports no session.
    pub auto_anonymous: bool,
    /// Custom token redeemed instead, when the first notification reports no session.
    pub initial_token: Option<Secret<String>>,
}

impl GateOptions {
    pub fn from_settings(site: &SiteSettings) -> Self {
        Self {
            auto_anonymous: site.auto_anonymous,
            initial_token: site.initial_token.clone(),
        }
    }

    fn bootstrap(self) -> Option<Bootstrap> {
        match (self.initial_token, self.auto_anonymous) {
            (Some(token), fallback) => Some(Bootstrap::CustomToken {
                token,
                fallback_anonymous: fallback,
            }),
            (None, true) => Some(Bootstrap::Anonymous),
            (None, false) => None,
        }
    }
}

/// The one startup sign-in attempt, spent by the first session notification.
enum Bootstrap {
    Anonymous,
    CustomToken {
        token: Secret<String>,
        fallback_anonymous: bool,
    },
}

impl Bootstrap {
    /// Returns whether a session was established; it arrives through the feed.
    async fn run(self, store: &dyn SessionStore) -> bool {
        if let Bootstrap::CustomToken {
            token,
            fallback_anonymous,
        } = self
        {
            match store.sign_in_with_custom_token(&token).await {
                Ok(session) => {
                    tracing::info!(uid = %session.uid(), "Signed in with initial token");
                    return true;
                }
                Err(e) if fallback_anonymous => {
                    tracing::warn!(error = %e, "Initial token rejected, falling back to anonymous sign-in");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Initial token rejected");
                    return false;
                }
            }
        }

        match store.sign_in_anonymously().await {
            Ok(session) => {
                tracing::info!(uid = %session.uid(), "Anonymous session established");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Anonymous sign-in failed, continuing without a session");
                false
            }
        }
    }
}

/// Tracks the session pushed by the session store and derives the UI mode.
///
/// The gate never builds sessions itself and never polls: its state changes
/// only when the store's feed delivers a transition.
pub struct AuthGate {
    store: Arc<dyn SessionStore>,
    admin: AdminEmail,
    state: Arc<watch::Sender<GateState>>,
    /// True once the first notification and any startup sign-in it
    /// triggered have both been observed.
    settled: Arc<watch::Sender<bool>>,
    listener: Mutex<Option<Subscription>>,
}

impl AuthGate {
    pub fn start(store: Arc<dyn SessionStore>, admin: AdminEmail, options: GateOptions) -> Arc<Self> {
        let (state, _) = watch::channel(GateState::Loading);
        let state = Arc::new(state);
        let (settled, _) = watch::channel(false);
        let settled = Arc::new(settled);

        let listener = {
            let store = store.clone();
            let state = state.clone();
            let settled = settled.clone();
            let mut bootstrap = options.bootstrap();

            Subscription::listen("session", store.subscribe(), move |session: Option<Session>| {
                let store = store.clone();
                let state = state.clone();
                let settled = settled.clone();
                let pending = bootstrap.take();

                async move {
                    let signed_out = session.is_none();
                    publish(&state, session);

                    if signed_out
                        && let Some(bootstrap) = pending
                        && bootstrap.run(store.as_ref()).await
                    {
                        // Settles when the new session is delivered.
                        return Flow::Continue;
                    }
                    settled.send_if_modified(|done| !std::mem::replace(done, true));
                    Flow::Continue
                }
            })
        };

        Arc::new(Self {
            store,
            admin,
            state,
            settled,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Credential sign-in. On success the new session arrives through the
    /// store's feed; on failure nothing changes and the caller shows
    /// [`AuthError::localized_message`].
    pub async fn sign_in(&self, email: &str, password: &Secret<String>) -> Result<Session, AuthError> {
        match self.store.sign_in_with_credential(email, password).await {
            Ok(session) => {
                tracing::info!(uid = %session.uid(), admin = self.admin.matches(Some(&session)), "Signed in");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed");
                Err(e)
            }
        }
    }

    /// Failures are logged and otherwise leave the session as it was.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.store.sign_out().await.inspect_err(|e| {
            tracing::error!(error = %e, "Sign-out failed");
        })
    }

    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// AdminStatus, recomputed from the current session on every call.
    pub fn is_admin(&self) -> bool {
        self.admin.matches(self.state.borrow().session())
    }

    pub fn mode(&self) -> ViewMode {
        view_mode(&self.state.borrow(), &self.admin)
    }

    pub fn admin_email(&self) -> &AdminEmail {
        &self.admin
    }

    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Waits until the gate has observed the session `uid`, or no session
    /// for `None`. Returns false if that did not happen `within` the limit.
    pub async fn observed(&self, uid: Option<&str>, within: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let wait = async {
            loop {
                let seen = {
                    let state = rx.borrow_and_update();
                    !state.is_loading() && state.session().map(Session::uid) == uid
                };
                if seen {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(within, wait).await.unwrap_or(false)
    }

    /// Waits until the gate has left Loading and any startup sign-in has
    /// been delivered. Returns false if that did not happen `within` the limit.
    pub async fn settled(&self, within: Duration) -> bool {
        let mut rx = self.settled.subscribe();
        let wait = async {
            loop {
                if *rx.borrow_and_update() {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(within, wait).await.unwrap_or(false)
    }

    /// Releases the session subscription; later transitions are ignored.
    pub async fn shutdown(&self) {
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.unsubscribe().await;
        }
    }
}

fn publish(state: &watch::Sender<GateState>, session: Option<Session>) {
    let next = GateState::Ready(session);
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        tracing::debug!(
            signed_in = next.session().is_some(),
            anonymous = next.session().is_some_and(Session::is_anonymous),
            "Session changed"
        );
        *current = next;
        true
    });
}
