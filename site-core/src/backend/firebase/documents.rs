//! Conversion between posts and Firestore's typed-value documents.

use crate::models::{NewPost, Post, PostPatch};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Deserialize)]
pub(super) struct Document {
    /// `projects/{p}/databases/(default)/documents/{collection}/{id}`
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl Document {
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn string_field(&self, key: &str) -> String {
        self.fields
            .get(key)
            .and_then(|v| v.get("stringValue"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn timestamp_field(&self, key: &str) -> Option<DateTime<Utc>> {
        self.fields
            .get(key)
            .and_then(|v| v.get("timestampValue"))
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn into_post(self) -> Post {
        Post {
            id: self.id().to_string(),
            title: self.string_field("title"),
            content: self.string_field("content"),
            author: self.string_field("author"),
            created_at: self.timestamp_field("timestamp"),
        }
    }
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

pub(super) fn encode_new_post(post: &NewPost) -> Value {
    json!({
        "fields": {
            "title": string_value(&post.title),
            "content": string_value(&post.content),
            "author": string_value(&post.author),
            "timestamp": {
                "timestampValue": post.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
            },
        }
    })
}

pub(super) fn encode_patch(patch: &PostPatch) -> Value {
    json!({
        "fields": {
            "title": string_value(&patch.title),
            "content": string_value(&patch.content),
        }
    })
}
