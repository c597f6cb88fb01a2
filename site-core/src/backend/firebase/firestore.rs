use super::documents::{Document, ListResponse, encode_new_post, encode_patch};
use super::{ErrorEnvelope, http_client};
use crate::backend::{ContentStore, SessionStore, SnapshotEvent, SnapshotFeed};
use crate::config::FirebaseSettings;
use crate::error::{AuthError, StoreError};
use crate::models::session::bearer;
use crate::models::{CollectionPath, NewPost, Post, PostPatch};
use crate::observability::TracedRequestExt;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

const PAGE_SIZE: &str = "300";

struct FirestoreInner {
    client: Client,
    settings: FirebaseSettings,
    sessions: Arc<dyn SessionStore>,
}

/// Content store backed by the Firestore REST API.
///
/// REST offers no push channel, so a live query is a listener task that
/// re-reads the collection every `poll_interval_ms` and delivers a snapshot
/// only when the contents changed.
#[derive(Clone)]
pub struct FirestoreContentStore {
    inner: Arc<FirestoreInner>,
}

impl FirestoreContentStore {
    pub fn new(
        settings: FirebaseSettings,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(http_client(&settings)?, settings, sessions))
    }

    /// Requests run as `sessions`, over a shared HTTP client.
    pub fn with_client(
        client: Client,
        settings: FirebaseSettings,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            inner: Arc::new(FirestoreInner {
                client,
                settings,
                sessions,
            }),
        }
    }
}

impl FirestoreInner {
    fn collection_url(&self, path: &CollectionPath) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            self.settings.firestore_url.trim_end_matches('/'),
            self.settings.project_id,
            path
        )
    }

    fn document_url(&self, path: &CollectionPath, id: &str) -> String {
        format!("{}/{}", self.collection_url(path), id)
    }

    /// Requests run as the current session so the store's security rules
    /// apply. The token is renewed first when it is close to expiry.
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let request = request.with_trace_context();
        let session = self
            .sessions
            .fresh_session()
            .await
            .map_err(session_unusable)?;
        Ok(match session {
            Some(session) => request.bearer_auth(bearer(&session)),
            None => request,
        })
    }

    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        self.authorize(request).await?.send().await.map_err(|e| {
            tracing::error!(operation = %what, "Document store request failed: {}", e);
            StoreError::from(e)
        })
    }

    /// Sends `request`; a rejected token is renewed and the request retried once.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        let retry = request.try_clone();
        let mut response = self.execute(request, what).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && let Some(retry) = retry
            && self.sessions.current().is_some()
        {
            tracing::info!(operation = %what, "Id token rejected, refreshing the session");
            self.sessions
                .refresh_session()
                .await
                .map_err(session_unusable)?;
            response = self.execute(retry, what).await?;
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
        tracing::warn!(
            operation = %what,
            status = %status,
            code = %envelope.error.status,
            "Document store rejected request"
        );
        Err(map_store_error(status, &envelope))
    }

    async fn list(&self, path: &CollectionPath) -> Result<Vec<Post>, StoreError> {
        let url = self.collection_url(path);
        let mut posts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListResponse = self
                .send(request, "list")
                .await?
                .json()
                .await
                .map_err(StoreError::from)?;

            posts.extend(page.documents.into_iter().map(Document::into_post));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(posts)
    }
}

/// A session whose token cannot be renewed can no longer pass the rules.
fn session_unusable(err: AuthError) -> StoreError {
    match err {
        AuthError::Network(detail) => StoreError::Network(detail),
        other => StoreError::PermissionDenied(format!("session could not be renewed: {}", other)),
    }
}

fn map_store_error(status: StatusCode, envelope: &ErrorEnvelope) -> StoreError {
    let detail = if envelope.error.message.is_empty() {
        status.to_string()
    } else {
        envelope.error.message.clone()
    };

    match (status, envelope.error.status.as_str()) {
        (_, "PERMISSION_DENIED" | "UNAUTHENTICATED")
        | (StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED, _) => {
            StoreError::PermissionDenied(detail)
        }
        (_, "NOT_FOUND") | (StatusCode::NOT_FOUND, _) => StoreError::NotFound(detail),
        (_, "UNAVAILABLE" | "DEADLINE_EXCEEDED") => StoreError::Network(detail),
        (s, _) if s.is_server_error() => StoreError::Network(detail),
        _ => StoreError::Unexpected(detail),
    }
}

async fn poll_collection(
    inner: Arc<FirestoreInner>,
    path: CollectionPath,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
) {
    let mut interval =
        tokio::time::interval(Duration::from_millis(inner.settings.poll_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<Vec<Post>> = None;

    loop {
        tokio::select! {
            _ = tx.closed() => break,
            _ = interval.tick() => {}
        }

        match inner.list(&path).await {
            Ok(posts) => {
                if last.as_ref() == Some(&posts) {
                    continue;
                }
                if tx.send(SnapshotEvent::Snapshot(posts.clone())).is_err() {
                    break;
                }
                last = Some(posts);
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Live query failed");
                let _ = tx.send(SnapshotEvent::Failed(e));
                break;
            }
        }
    }

    tracing::debug!(path = %path, "Live query closed");
}

#[async_trait]
impl ContentStore for FirestoreContentStore {
    fn subscribe_collection(&self, path: &CollectionPath) -> SnapshotFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(poll_collection(self.inner.clone(), path.clone(), tx));
        rx
    }

    async fn create(&self, path: &CollectionPath, post: NewPost) -> Result<String, StoreError> {
        let request = self
            .inner
            .client
            .post(self.inner.collection_url(path))
            .json(&encode_new_post(&post));

        let document: Document = self
            .inner
            .send(request, "create")
            .await?
            .json()
            .await
            .map_err(StoreError::from)?;

        Ok(document.id().to_string())
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        patch: PostPatch,
    ) -> Result<(), StoreError> {
        let request = self
            .inner
            .client
            .patch(self.inner.document_url(path, id))
            .query(&[
                ("updateMask.fieldPaths", "title"),
                ("updateMask.fieldPaths", "content"),
                ("currentDocument.exists", "true"),
            ])
            .json(&encode_patch(&patch));

        self.inner.send(request, "update").await?;
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        let request = self.inner.client.delete(self.inner.document_url(path, id));
        self.inner.send(request, "delete").await?;
        Ok(())
    }
}
