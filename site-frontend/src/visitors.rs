//! One site client per browser session.
//!
//! The cookie session carries only a visitor key. Each key owns a
//! `SiteClient` with its own auth gate, content sync and editor, so a
//! sign-in in one browser never changes what another browser sees.

use crate::error::AppError;
use crate::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use parking_lot::Mutex;
use site_core::backend::Backend;
use site_core::client::SiteClient;
use site_core::config::CoreConfig;
use site_core::error::ConfigError;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower_sessions::Session;
use uuid::Uuid;

/// Cookie-session key holding the visitor id.
pub const VISITOR_KEY: &str = "visitor_id";

/// How long a new visitor's first request waits for the startup sign-in.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

struct Entry {
    client: Arc<SiteClient>,
    last_seen: Instant,
}

pub struct Visitors {
    backend: Backend,
    config: CoreConfig,
    idle: Duration,
    clients: Mutex<HashMap<String, Entry>>,
    closed: CancellationToken,
}

impl Visitors {
    pub fn new(backend: Backend, config: CoreConfig, idle: Duration) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.site.initial_token.is_some() {
            return Err(ConfigError::Invalid(
                "site.initial_token signs every visitor in as the same user; leave it unset for the web frontend"
                    .to_string(),
            ));
        }

        Ok(Self {
            backend,
            config,
            idle,
            clients: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
        })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The visitor's client, started on first use. A new client is returned
    /// once its startup sign-in settled so the first page is not the loader.
    pub async fn client(&self, key: &str) -> Result<Arc<SiteClient>, ConfigError> {
        let (client, started) = {
            let mut clients = self.clients.lock();
            match clients.get_mut(key) {
                Some(entry) => {
                    entry.last_seen = Instant::now();
                    (entry.client.clone(), false)
                }
                None => {
                    let client = Arc::new(SiteClient::start(self.backend.connect(), &self.config)?);
                    clients.insert(
                        key.to_string(),
                        Entry {
                            client: client.clone(),
                            last_seen: Instant::now(),
                        },
                    );
                    (client, true)
                }
            }
        };

        if started {
            tracing::debug!(visitors = self.len(), "Visitor client started");
            if !client.gate.settled(SETTLE_TIMEOUT).await {
                tracing::warn!("Startup sign-in did not settle in time");
            }
        }

        Ok(client)
    }

    /// Stops the clients of visitors idle for longer than the session lifetime.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.clients.lock().retain(|_, entry| {
            let keep = now.duration_since(entry.last_seen) < self.idle;
            if !keep {
                evicted.push(entry.client.clone());
            }
            keep
        });

        for client in &evicted {
            client.shutdown().await;
        }
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "Idle visitor clients released");
        }
        evicted.len()
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let visitors = Arc::downgrade(self);
        let closed = self.closed.clone();
        let every = every.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(visitors) = visitors.upgrade() else { break };
                        visitors.evict_idle().await;
                    }
                }
            }
        })
    }

    /// Stops the sweeper and releases every client's subscriptions.
    pub async fn shutdown(&self) {
        self.closed.cancel();
        let clients: Vec<_> = self
            .clients
            .lock()
            .drain()
            .map(|(_, entry)| entry.client)
            .collect();

        for client in &clients {
            client.shutdown().await;
        }
        tracing::info!(count = clients.len(), "Visitor clients released");
    }
}

/// The requesting browser's site client.
pub struct Visitor(pub Arc<SiteClient>);

impl Deref for Visitor {
    type Target = SiteClient;

    fn deref(&self) -> &SiteClient {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Session("session layer is not installed".to_string()))?;

        let key = visitor_key(&session).await?;
        let client = state.visitors.client(&key).await?;
        Ok(Visitor(client))
    }
}

async fn visitor_key(session: &Session) -> Result<String, AppError> {
    if let Some(key) = session
        .get::<String>(VISITOR_KEY)
        .await
        .map_err(|e| AppError::Session(e.to_string()))?
    {
        return Ok(key);
    }

    let key = Uuid::new_v4().to_string();
    session
        .insert(VISITOR_KEY, &key)
        .await
        .map_err(|e| AppError::Session(e.to_string()))?;
    Ok(key)
}
