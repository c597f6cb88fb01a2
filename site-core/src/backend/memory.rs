//! Embedded stand-ins for the identity provider and the document database.
//!
//! Used as the development backend and as the fixture for tests: both stores
//! push to every subscriber like their hosted counterparts, count remote
//! calls, and can be told to fail.

use super::subscription::Fanout;
use super::{ContentStore, SessionFeed, SessionStore, SnapshotEvent, SnapshotFeed};
use crate::error::{AuthError, StoreError};
use crate::models::{CollectionPath, NewPost, Post, PostPatch, Session};
use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

struct Account {
    uid: String,
    email: String,
    password: Secret<String>,
    disabled: bool,
}

/// Accounts and failure switches, shared by every connected store.
#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    custom_tokens: HashMap<String, String>,
    offline: bool,
    fail_anonymous: bool,
    anonymous_sign_ins: usize,
    credential_sign_ins: usize,
}

impl Directory {
    fn ensure_online(&self) -> Result<(), AuthError> {
        if self.offline {
            return Err(AuthError::Network("identity provider unreachable".to_string()));
        }
        Ok(())
    }
}

/// One client's signed-in state.
#[derive(Default)]
struct ClientSession {
    current: Option<Session>,
    subscribers: Fanout<Option<Session>>,
}

impl ClientSession {
    fn establish(&mut self, session: Session) -> Session {
        self.current = Some(session.clone());
        self.subscribers.send(&self.current);
        session
    }
}

/// In-memory identity provider as one client sees it.
///
/// [`connect`](Self::connect) hands out further clients of the same
/// provider: they share accounts and tokens but each has its own session.
#[derive(Default)]
pub struct MemorySessionStore {
    directory: Arc<Mutex<Directory>>,
    session: Mutex<ClientSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Another client of the same provider, starting signed out.
    pub fn connect(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            session: Mutex::new(ClientSession::default()),
        }
    }

    /// Starts with a credentialed session already in place, as if one had
    /// been persisted by an earlier run.
    pub fn with_restored_session(email: &str, password: Secret<String>) -> Self {
        let store = Self::new();
        let uid = store.register(email, password, false);
        let token = Uuid::new_v4().to_string();
        store.session.lock().current = Some(Session::credentialed(uid, token, email));
        store
    }

    /// Adds a credential account and returns its uid.
    pub fn register(&self, email: &str, password: Secret<String>, disabled: bool) -> String {
        let uid = Uuid::new_v4().to_string();
        self.directory.lock().accounts.insert(
            email.trim().to_ascii_lowercase(),
            Account {
                uid: uid.clone(),
                email: email.trim().to_string(),
                password,
                disabled,
            },
        );
        uid
    }

    /// Makes `token` redeemable for a session of the account `email`.
    pub fn issue_custom_token(&self, token: &str, email: &str) {
        self.directory
            .lock()
            .custom_tokens
            .insert(token.to_string(), email.trim().to_ascii_lowercase());
    }

    /// Simulates a lost connection: every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.directory.lock().offline = offline;
    }

    pub fn fail_anonymous_sign_in(&self, fail: bool) {
        self.directory.lock().fail_anonymous = fail;
    }

    pub fn anonymous_sign_ins(&self) -> usize {
        self.directory.lock().anonymous_sign_ins
    }

    pub fn credential_sign_ins(&self) -> usize {
        self.directory.lock().credential_sign_ins
    }

    pub fn subscriber_count(&self) -> usize {
        self.session.lock().subscribers.len()
    }

    fn establish(&self, session: Session) -> Session {
        self.session.lock().establish(session)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn sign_in_with_credential(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<Session, AuthError> {
        let session = {
            let mut directory = self.directory.lock();
            directory.credential_sign_ins += 1;
            directory.ensure_online()?;

            let account = directory
                .accounts
                .get(&email.trim().to_ascii_lowercase())
                .ok_or(AuthError::InvalidCredential)?;
            if account.password.expose_secret() != password.expose_secret() {
                return Err(AuthError::InvalidCredential);
            }
            if account.disabled {
                return Err(AuthError::Disabled);
            }

            Session::credentialed(
                account.uid.clone(),
                Uuid::new_v4().to_string(),
                account.email.clone(),
            )
        };
        Ok(self.establish(session))
    }

    async fn sign_in_with_custom_token(
        &self,
        token: &Secret<String>,
    ) -> Result<Session, AuthError> {
        let session = {
            let directory = self.directory.lock();
            directory.ensure_online()?;

            let account = directory
                .custom_tokens
                .get(token.expose_secret())
                .and_then(|email| directory.accounts.get(email))
                .ok_or(AuthError::InvalidCredential)?;
            if account.disabled {
                return Err(AuthError::Disabled);
            }

            Session::credentialed(
                account.uid.clone(),
                Uuid::new_v4().to_string(),
                account.email.clone(),
            )
        };
        Ok(self.establish(session))
    }

    async fn sign_in_anonymously(&self) -> Result<Session, AuthError> {
        {
            let mut directory = self.directory.lock();
            directory.anonymous_sign_ins += 1;
            directory.ensure_online()?;
            if directory.fail_anonymous {
                return Err(AuthError::Network("anonymous sign-in rejected".to_string()));
            }
        }

        let session = Session::anonymous(Uuid::new_v4().to_string(), Uuid::new_v4().to_string());
        Ok(self.establish(session))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.directory.lock().ensure_online()?;

        let mut session = self.session.lock();
        if session.current.take().is_some() {
            session.subscribers.send(&None);
        }
        Ok(())
    }

    fn subscribe(&self) -> SessionFeed {
        let mut session = self.session.lock();
        let current = session.current.clone();
        session.subscribers.add(Some(current))
    }

    fn current(&self) -> Option<Session> {
        self.session.lock().current.clone()
    }
}

#[derive(Default)]
struct ContentInner {
    collections: HashMap<CollectionPath, Vec<Post>>,
    listeners: HashMap<CollectionPath, Fanout<SnapshotEvent>>,
    deny_reads: bool,
    write_failure: Option<StoreError>,
    writes: usize,
}

impl ContentInner {
    fn publish(&mut self, path: &CollectionPath) {
        let snapshot = SnapshotEvent::Snapshot(
            self.collections.get(path).cloned().unwrap_or_default(),
        );
        if let Some(listeners) = self.listeners.get_mut(path) {
            listeners.send(&snapshot);
        }
    }

    fn begin_write(&mut self) -> Result<(), StoreError> {
        self.writes += 1;
        match &self.write_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryContentStore {
    inner: Mutex<ContentInner>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a document as another client would, bypassing the write
    /// counter, and pushes the new collection to listeners.
    pub fn put_document(&self, path: &CollectionPath, post: Post) {
        let mut inner = self.inner.lock();
        let docs = inner.collections.entry(path.clone()).or_default();
        match docs.iter_mut().find(|existing| existing.id == post.id) {
            Some(existing) => *existing = post,
            None => docs.push(post),
        }
        inner.publish(path);
    }

    /// Removes a document as another client would.
    pub fn remove_document(&self, path: &CollectionPath, id: &str) {
        let mut inner = self.inner.lock();
        if let Some(docs) = inner.collections.get_mut(path) {
            docs.retain(|post| post.id != id);
        }
        inner.publish(path);
    }

    pub fn documents(&self, path: &CollectionPath) -> Vec<Post> {
        self.inner
            .lock()
            .collections
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Rejects new live queries with a permission error.
    pub fn deny_reads(&self, deny: bool) {
        self.inner.lock().deny_reads = deny;
    }

    /// Terminates every open live query on `path` with `err`.
    pub fn break_listeners(&self, path: &CollectionPath, err: StoreError) {
        let mut inner = self.inner.lock();
        if let Some(mut listeners) = inner.listeners.remove(path) {
            listeners.send(&SnapshotEvent::Failed(err));
            listeners.close();
        }
    }

    /// Makes every subsequent write fail with `err` (or succeed again with `None`).
    pub fn fail_writes(&self, err: Option<StoreError>) {
        self.inner.lock().write_failure = err;
    }

    /// Remote write calls received so far, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.inner.lock().writes
    }

    pub fn listener_count(&self, path: &CollectionPath) -> usize {
        self.inner
            .lock()
            .listeners
            .get(path)
            .map_or(0, Fanout::len)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn subscribe_collection(&self, path: &CollectionPath) -> SnapshotFeed {
        let mut inner = self.inner.lock();

        if inner.deny_reads {
            let mut rejected = Fanout::default();
            let feed = rejected.add(Some(SnapshotEvent::Failed(StoreError::PermissionDenied(
                format!("read access to {} denied", path),
            ))));
            return feed;
        }

        let initial = SnapshotEvent::Snapshot(
            inner.collections.get(path).cloned().unwrap_or_default(),
        );
        inner
            .listeners
            .entry(path.clone())
            .or_default()
            .add(Some(initial))
    }

    async fn create(&self, path: &CollectionPath, post: NewPost) -> Result<String, StoreError> {
        let mut inner = self.inner.lock();
        inner.begin_write()?;

        let id = Uuid::new_v4().simple().to_string();
        inner.collections.entry(path.clone()).or_default().push(Post {
            id: id.clone(),
            title: post.title,
            content: post.content,
            author: post.author,
            created_at: Some(post.created_at),
        });
        inner.publish(path);
        Ok(id)
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        patch: PostPatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.begin_write()?;

        let post = inner
            .collections
            .get_mut(path)
            .and_then(|docs| docs.iter_mut().find(|post| post.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", path, id)))?;
        post.title = patch.title;
        post.content = patch.content;
        inner.publish(path);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.begin_write()?;

        // Deleting a missing document succeeds, as in the hosted store.
        if let Some(docs) = inner.collections.get_mut(path) {
            docs.retain(|post| post.id != id);
        }
        inner.publish(path);
        Ok(())
    }
}
