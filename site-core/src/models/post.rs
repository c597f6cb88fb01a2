use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

/// A published article as delivered by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: String,
    /// Missing on documents written by other tools; such posts sort as oldest.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Milliseconds since the epoch, with a missing timestamp counted as zero.
    pub fn sort_key(&self) -> i64 {
        self.created_at.map_or(0, |t| t.timestamp_millis())
    }

    pub fn published_on(&self) -> Option<String> {
        self.created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    }
}

/// Fields written when a post is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// The only fields an update may touch; id, author and created-at are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostPatch {
    pub title: String,
    pub content: String,
}

/// Orders posts newest first. The sort is stable, so equal timestamps keep
/// the store's delivery order and re-sorting a sorted slice is a no-op.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by_key(|post| Reverse(post.sort_key()));
}

/// Location of the post collection inside the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// The site-wide public collection; identical for every viewer.
    pub fn public_posts(app_id: &str) -> Self {
        Self(format!("artifacts/{}/public/data/posts", app_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
