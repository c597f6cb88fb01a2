#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use secrecy::Secret;
use site_core::async_trait::async_trait;
use site_core::backend::{ContentStore, MemoryContentStore, MemorySessionStore, SnapshotFeed};
use site_core::client::{AuthGate, GateOptions, GateState, SyncState};
use site_core::error::StoreError;
use site_core::models::{AdminEmail, CollectionPath, NewPost, Post, PostPatch};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};

pub const ADMIN_EMAIL: &str = "admin@x.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const READER_EMAIL: &str = "reader@x.com";
pub const READER_PASSWORD: &str = "reader-password";
pub const APP_ID: &str = "test-app";

const WAIT: Duration = Duration::from_secs(2);

pub fn secret(value: &str) -> Secret<String> {
    Secret::new(value.to_string())
}

pub fn admin() -> AdminEmail {
    AdminEmail::parse(ADMIN_EMAIL).expect("valid admin email")
}

pub fn posts_path() -> CollectionPath {
    CollectionPath::public_posts(APP_ID)
}

pub fn at(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().expect("valid timestamp")
}

pub fn post(id: &str, title: &str, created_millis: i64) -> Post {
    Post {
        id: id.to_string(),
        title: title.to_string(),
        content: format!("{} body", title),
        author: ADMIN_EMAIL.to_string(),
        created_at: Some(at(created_millis)),
    }
}

/// Session store with the admin and a reader account registered.
pub fn session_store() -> Arc<MemorySessionStore> {
    let store = MemorySessionStore::new();
    store.register(ADMIN_EMAIL, secret(ADMIN_PASSWORD), false);
    store.register(READER_EMAIL, secret(READER_PASSWORD), false);
    Arc::new(store)
}

pub fn no_bootstrap() -> GateOptions {
    GateOptions {
        auto_anonymous: false,
        initial_token: None,
    }
}

pub fn anonymous_bootstrap() -> GateOptions {
    GateOptions {
        auto_anonymous: true,
        initial_token: None,
    }
}

/// Waits until `rx` holds a value satisfying `pred`.
pub async fn wait_for<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T
where
    T: Clone,
{
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed")
        .clone()
}

pub async fn wait_ready(gate: &AuthGate) -> GateState {
    wait_for(&mut gate.watch(), |state| !state.is_loading()).await
}

pub async fn wait_signed_in(gate: &AuthGate) -> GateState {
    wait_for(&mut gate.watch(), |state| state.session().is_some()).await
}

pub async fn wait_signed_out(gate: &AuthGate) -> GateState {
    wait_for(&mut gate.watch(), |state| {
        !state.is_loading() && state.session().is_none()
    })
    .await
}

pub async fn wait_posts(
    rx: &mut watch::Receiver<SyncState>,
    pred: impl Fn(&[Post]) -> bool,
) -> SyncState {
    wait_for(rx, |state| !state.loading && pred(&state.posts)).await
}

/// Polls `check` until it holds, for counters that are not observable
/// through a watch channel.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn with_timeout<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("operation timed out")
}

/// Content store whose writes pause after reaching the store until the test
/// releases them, so the session can change while a request is in flight.
pub struct PausingContentStore {
    pub inner: Arc<MemoryContentStore>,
    pub reached: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl PausingContentStore {
    pub fn new(inner: Arc<MemoryContentStore>) -> Self {
        Self {
            inner,
            reached: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    async fn pause(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

#[async_trait]
impl ContentStore for PausingContentStore {
    fn subscribe_collection(&self, path: &CollectionPath) -> SnapshotFeed {
        self.inner.subscribe_collection(path)
    }

    async fn create(&self, path: &CollectionPath, post: NewPost) -> Result<String, StoreError> {
        let id = self.inner.create(path, post).await?;
        self.pause().await;
        Ok(id)
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        patch: PostPatch,
    ) -> Result<(), StoreError> {
        self.inner.update(path, id, patch).await?;
        self.pause().await;
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        self.inner.delete(path, id).await
    }
}
