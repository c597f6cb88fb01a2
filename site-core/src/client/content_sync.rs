use super::view::GateState;
use crate::backend::{ContentStore, Flow, SnapshotEvent, Subscription};
use crate::error::StoreError;
use crate::models::{CollectionPath, Post, sort_newest_first};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Locally cached projection of the post collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Newest first. Replaced wholesale on every push, never merged.
    pub posts: Vec<Post>,
    /// True from activation until the first push or failure.
    pub loading: bool,
    /// Set when the live query failed; the cache keeps its last contents.
    pub error: Option<StoreError>,
    pub active: bool,
}

/// Keeps [`SyncState`] in step with the content store through one live query.
pub struct ContentSync {
    store: Arc<dyn ContentStore>,
    path: CollectionPath,
    state: Arc<watch::Sender<SyncState>>,
    /// Bumped on every activation and deactivation; pushes from an older
    /// activation are discarded.
    epoch: Arc<AtomicU64>,
    query: Mutex<Option<Subscription>>,
    follower: Mutex<Option<CancellationToken>>,
}

impl ContentSync {
    pub fn new(store: Arc<dyn ContentStore>, path: CollectionPath) -> Arc<Self> {
        let (state, _) = watch::channel(SyncState::default());
        Arc::new(Self {
            store,
            path,
            state: Arc::new(state),
            epoch: Arc::new(AtomicU64::new(0)),
            query: Mutex::new(None),
            follower: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state.borrow().posts.clone()
    }

    pub fn find(&self, id: &str) -> Option<Post> {
        self.state.borrow().posts.iter().find(|post| post.id == id).cloned()
    }

    pub fn is_active(&self) -> bool {
        self.query.lock().is_some()
    }

    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Opens the live query unless one is already open.
    pub fn activate(&self) {
        let mut query = self.query.lock();
        if query.is_some() {
            return;
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            state.active = true;
        });

        let state = self.state.clone();
        let current_epoch = self.epoch.clone();
        let path = self.path.clone();
        let feed = self.store.subscribe_collection(&self.path);

        *query = Some(Subscription::listen("posts", feed, move |event: SnapshotEvent| {
            let flow = apply(&state, &current_epoch, epoch, &path, event);
            async move { flow }
        }));

        tracing::info!(path = %self.path, "Post subscription opened");
    }

    /// Closes the live query. No push is applied after this returns.
    pub async fn deactivate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let query = self.query.lock().take();

        if let Some(query) = query {
            query.unsubscribe().await;
            self.state.send_modify(|state| {
                state.loading = false;
                state.active = false;
            });
            tracing::info!(path = %self.path, "Post subscription closed");
        }
    }

    /// Activates while the gate reports a session and deactivates when it
    /// goes away. A different user re-opens the query so it runs under the
    /// new identity.
    pub fn follow(self: &Arc<Self>, mut gate: watch::Receiver<GateState>) {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.follower.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        let sync: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut active_uid: Option<String> = None;

            loop {
                let uid = gate.borrow_and_update().session().map(|s| s.uid().to_string());
                let Some(sync) = sync.upgrade() else { break };

                if uid != active_uid {
                    if active_uid.is_some() {
                        sync.deactivate().await;
                    }
                    if uid.is_some() {
                        sync.activate();
                    }
                    active_uid = uid;
                }
                drop(sync);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = gate.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Stops following the gate and releases the live query.
    pub async fn shutdown(&self) {
        if let Some(follower) = self.follower.lock().take() {
            follower.cancel();
        }
        self.deactivate().await;
    }
}

fn apply(
    state: &watch::Sender<SyncState>,
    current_epoch: &AtomicU64,
    epoch: u64,
    path: &CollectionPath,
    event: SnapshotEvent,
) -> Flow {
    if current_epoch.load(Ordering::SeqCst) != epoch {
        tracing::debug!(path = %path, "Dropping push from a closed subscription");
        return Flow::Stop;
    }

    match event {
        SnapshotEvent::Snapshot(mut posts) => {
            sort_newest_first(&mut posts);
            tracing::debug!(path = %path, count = posts.len(), "Posts snapshot applied");
            state.send_modify(|state| {
                state.posts = posts;
                state.loading = false;
                state.error = None;
            });
            Flow::Continue
        }
        SnapshotEvent::Failed(e) => {
            tracing::error!(path = %path, error = %e, "Post subscription failed");
            state.send_modify(|state| {
                state.loading = false;
                state.error = Some(e);
            });
            Flow::Stop
        }
    }
}
