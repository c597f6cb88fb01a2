//! Askama views for the four screens plus the delete confirmation.

use askama::Template;
use site_core::client::{EditingDraft, PostForm, SyncState};
use site_core::messages;
use site_core::models::Post;

/// A post as the views show it.
pub struct PostView {
    pub id: String,
    pub title: String,
    pub content: String,
    pub published_on: String,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            content: post.content.clone(),
            published_on: post
                .published_on()
                .unwrap_or_else(|| messages::DATE_NOT_AVAILABLE.to_string()),
        }
    }
}

/// What the post list shows: a loading note, an error, nothing yet, or the posts.
pub struct PostList {
    pub loading: bool,
    pub error: Option<&'static str>,
    pub posts: Vec<PostView>,
}

impl From<&SyncState> for PostList {
    fn from(state: &SyncState) -> Self {
        Self {
            loading: state.loading,
            error: state.error.as_ref().map(|_| messages::POSTS_UNAVAILABLE),
            posts: state.posts.iter().map(PostView::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "loading.html")]
pub struct LoadingTemplate {
    pub message: &'static str,
}

impl Default for LoadingTemplate {
    fn default() -> Self {
        Self {
            message: messages::LOADING_SITE,
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<&'static str>,
    pub email: String,
    pub admin_email: String,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub notice: Option<&'static str>,
    pub error: Option<&'static str>,
    pub form: PostForm,
    pub draft: Option<EditingDraft>,
    pub list: PostList,
    pub loading_text: &'static str,
    pub empty_text: &'static str,
    pub published_label: &'static str,
}

#[derive(Template)]
#[template(path = "public.html")]
pub struct PublicTemplate {
    pub list: PostList,
    pub contact_relay_url: Option<String>,
    pub loading_text: &'static str,
    pub empty_text: &'static str,
    pub published_label: &'static str,
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub id: String,
    pub title: String,
    pub prompt: &'static str,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}
