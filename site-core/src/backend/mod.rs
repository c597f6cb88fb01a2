//! The two external collaborators: the identity provider (session store) and
//! the document database (content store), plus their implementations.

pub mod firebase;
pub mod memory;
pub mod subscription;

use crate::config::{BackendSettings, FirebaseSettings};
use crate::error::{AuthError, ConfigError, StoreError};
use crate::models::{CollectionPath, NewPost, Post, PostPatch, Session};
use async_trait::async_trait;
use secrecy::Secret;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use firebase::{FirebaseSessionStore, FirestoreContentStore};
pub use memory::{MemoryContentStore, MemorySessionStore};
pub use subscription::{Fanout, Flow, Subscription};

/// Session transitions pushed by the store; `None` means signed out.
pub type SessionFeed = mpsc::UnboundedReceiver<Option<Session>>;

/// Live query deliveries for one collection.
pub type SnapshotFeed = mpsc::UnboundedReceiver<SnapshotEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    /// The full current contents of the collection, in store order.
    Snapshot(Vec<Post>),
    /// The live query failed; no further events follow.
    Failed(StoreError),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn sign_in_with_credential(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<Session, AuthError>;

    async fn sign_in_with_custom_token(&self, token: &Secret<String>)
    -> Result<Session, AuthError>;

    async fn sign_in_anonymously(&self) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Registers for session transitions. The current state is delivered
    /// first; dropping the feed unregisters.
    fn subscribe(&self) -> SessionFeed;

    fn current(&self) -> Option<Session>;

    /// The current session, with its token renewed first if it is about to
    /// expire. Stores whose tokens never expire return [`current`](Self::current).
    async fn fresh_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.current())
    }

    /// Renews the token even though it still looks valid, after a backend
    /// rejected it.
    async fn refresh_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.current())
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Opens a live query. Every event carries the whole collection;
    /// dropping the feed closes the query.
    fn subscribe_collection(&self, path: &CollectionPath) -> SnapshotFeed;

    async fn create(&self, path: &CollectionPath, post: NewPost) -> Result<String, StoreError>;

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        patch: PostPatch,
    ) -> Result<(), StoreError>;

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError>;
}

/// The pair of stores one site client runs against.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub content: Arc<dyn ContentStore>,
}

impl Stores {
    pub fn new(sessions: Arc<dyn SessionStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { sessions, content }
    }
}

/// Backend resources shared by every site client in the process.
///
/// Each client connects with its own session store, so one visitor's
/// sign-in never becomes another's. Account data and documents are shared.
#[derive(Clone)]
pub enum Backend {
    Memory {
        directory: Arc<MemorySessionStore>,
        content: Arc<MemoryContentStore>,
    },
    Firebase {
        client: reqwest::Client,
        settings: FirebaseSettings,
    },
}

impl Backend {
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, ConfigError> {
        match settings {
            BackendSettings::Memory(memory) => {
                let directory = MemorySessionStore::new();
                for account in &memory.accounts {
                    directory.register(&account.email, account.password.clone(), account.disabled);
                }
                tracing::info!(
                    accounts = memory.accounts.len(),
                    "Using in-memory session and content stores"
                );
                Ok(Self::Memory {
                    directory: Arc::new(directory),
                    content: Arc::new(MemoryContentStore::new()),
                })
            }
            BackendSettings::Firebase(firebase) => {
                let client = firebase::http_client(firebase)?;
                tracing::info!(project_id = %firebase.project_id, "Using Firebase backend");
                Ok(Self::Firebase {
                    client,
                    settings: firebase.clone(),
                })
            }
        }
    }

    /// Stores for one more client: a session store of its own, bound to
    /// the shared content.
    pub fn connect(&self) -> Stores {
        match self {
            Backend::Memory { directory, content } => {
                Stores::new(Arc::new(directory.connect()), content.clone())
            }
            Backend::Firebase { client, settings } => {
                let sessions: Arc<dyn SessionStore> = Arc::new(
                    FirebaseSessionStore::with_client(client.clone(), settings.clone()),
                );
                let content = Arc::new(FirestoreContentStore::with_client(
                    client.clone(),
                    settings.clone(),
                    sessions.clone(),
                ));
                Stores::new(sessions, content)
            }
        }
    }
}
