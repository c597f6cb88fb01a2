use super::app::Notice;
use crate::error::{editor_status, AppError};
use crate::views::{AdminTemplate, ConfirmDeleteTemplate, PostList};
use crate::visitors::Visitor;
use axum::{
    extract::Path,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use site_core::client::{DeleteOutcome, SiteClient};
use site_core::error::EditorError;
use site_core::messages;

#[derive(Debug, Default)]
pub struct AdminFeedback {
    pub notice: Option<&'static str>,
    pub error: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAnswer {
    #[serde(default)]
    pub confirm: String,
}

impl DeleteAnswer {
    fn accepted(&self) -> bool {
        self.confirm == "yes"
    }
}

pub async fn render_admin(client: &SiteClient, feedback: AdminFeedback) -> AdminTemplate {
    let (form, draft) = {
        let editor = client.editor.lock().await;
        (editor.form().clone(), editor.draft().cloned())
    };

    AdminTemplate {
        notice: feedback.notice,
        error: feedback.error,
        form,
        draft,
        list: PostList::from(&client.sync.state()),
        loading_text: messages::LOADING_POSTS,
        empty_text: messages::NO_POSTS_ADMIN,
        published_label: messages::PUBLISHED_ON,
    }
}

/// Re-renders the panel with the command's error; the editor keeps the input.
async fn rejected(client: &SiteClient, err: EditorError) -> Response {
    let status = editor_status(&err);
    let feedback = AdminFeedback {
        notice: None,
        error: Some(err.localized_message()),
    };
    (status, render_admin(client, feedback).await).into_response()
}

pub async fn create_post(visitor: Visitor, Form(input): Form<PostInput>) -> Response {
    let result = visitor
        .editor
        .lock()
        .await
        .create(&input.title, &input.content)
        .await;

    match result {
        Ok(_) => Redirect::to(Notice::Created.location()).into_response(),
        Err(e) => rejected(&visitor, e).await,
    }
}

pub async fn edit_post(
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let post = visitor
        .sync
        .find(&id)
        .ok_or_else(|| AppError::NotFound(format!("post {}", id)))?;

    visitor.editor.lock().await.begin_edit(post);
    Ok(Redirect::to("/"))
}

pub async fn update_post(visitor: Visitor, Form(input): Form<PostInput>) -> Response {
    let result = {
        let mut editor = visitor.editor.lock().await;
        match editor.revise(&input.title, &input.content) {
            Ok(()) => editor.update().await,
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(()) => Redirect::to(Notice::Updated.location()).into_response(),
        Err(e) => rejected(&visitor, e).await,
    }
}

pub async fn cancel_edit(visitor: Visitor) -> Redirect {
    visitor.editor.lock().await.cancel_edit();
    Redirect::to("/")
}

/// The yes/no prompt shown before a delete.
pub async fn confirm_delete_page(
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<ConfirmDeleteTemplate, AppError> {
    let post = visitor
        .sync
        .find(&id)
        .ok_or_else(|| AppError::NotFound(format!("post {}", id)))?;

    Ok(ConfirmDeleteTemplate {
        id: post.id,
        title: post.title,
        prompt: messages::CONFIRM_DELETE,
    })
}

pub async fn delete_post(
    visitor: Visitor,
    Path(id): Path<String>,
    Form(answer): Form<DeleteAnswer>,
) -> Response {
    let accepted = answer.accepted();
    let result = visitor.editor.lock().await.delete(&id, &accepted).await;

    match result {
        Ok(DeleteOutcome::Deleted) => Redirect::to(Notice::Deleted.location()).into_response(),
        Ok(DeleteOutcome::Declined) => Redirect::to("/").into_response(),
        Err(e) => rejected(&visitor, e).await,
    }
}
