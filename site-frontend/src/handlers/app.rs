use super::posts::{render_admin, AdminFeedback};
use crate::views::{LoadingTemplate, LoginTemplate, PostList, PublicTemplate};
use crate::visitors::Visitor;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use site_core::client::ViewMode;
use site_core::messages;

/// Outcome of the last admin command, carried across the redirect.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Notice {
    Created,
    Updated,
    Deleted,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::Created => messages::POST_CREATED,
            Notice::Updated => messages::POST_UPDATED,
            Notice::Deleted => messages::POST_DELETED,
        }
    }

    pub fn location(self) -> &'static str {
        match self {
            Notice::Created => "/?notice=created",
            Notice::Updated => "/?notice=updated",
            Notice::Deleted => "/?notice=deleted",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub notice: Option<Notice>,
}

/// Renders whichever screen the visitor's view mode selects.
pub async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<IndexQuery>,
) -> Response {
    match visitor.mode() {
        ViewMode::Loading => LoadingTemplate::default().into_response(),
        ViewMode::LoginForm => LoginTemplate {
            error: None,
            email: String::new(),
            admin_email: visitor.gate.admin_email().as_str().to_string(),
        }
        .into_response(),
        ViewMode::AdminPanel => {
            let feedback = AdminFeedback {
                notice: query.notice.map(Notice::message),
                error: None,
            };
            render_admin(&visitor, feedback).await.into_response()
        }
        ViewMode::PublicSite => PublicTemplate {
            list: PostList::from(&visitor.sync.state()),
            contact_relay_url: state.contact_relay_url.clone(),
            loading_text: messages::LOADING_POSTS,
            empty_text: messages::NO_POSTS_PUBLIC,
            published_label: messages::PUBLISHED_ON,
        }
        .into_response(),
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
