use super::auth_gate::AuthGate;
use crate::backend::ContentStore;
use crate::error::{EditorError, WriteOp};
use crate::messages;
use crate::models::{CollectionPath, NewPost, Post, PostPatch, Session};
use chrono::Utc;
use std::sync::Arc;

/// The "new post" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostForm {
    pub title: String,
    pub content: String,
}

/// A post being edited: the original plus the pending title and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingDraft {
    pub original: Post,
    pub title: String,
    pub content: String,
}

impl EditingDraft {
    pub fn id(&self) -> &str {
        &self.original.id
    }
}

/// Answers the yes/no question asked before a delete.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl Confirm for bool {
    fn confirm(&self, _prompt: &str) -> bool {
        *self
    }
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The confirmation was declined; nothing was sent.
    Declined,
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Admin form state and the write commands it issues.
///
/// Gating on AdminStatus here only spares the user a doomed request; the
/// content store's access rules decide what is actually allowed. No command
/// touches the post cache: results show up with the next pushed snapshot.
pub struct AdminEditor {
    gate: Arc<AuthGate>,
    store: Arc<dyn ContentStore>,
    path: CollectionPath,
    form: PostForm,
    draft: Option<EditingDraft>,
}

impl AdminEditor {
    pub fn new(gate: Arc<AuthGate>, store: Arc<dyn ContentStore>, path: CollectionPath) -> Self {
        Self {
            gate,
            store,
            path,
            form: PostForm::default(),
            draft: None,
        }
    }

    pub fn form(&self) -> &PostForm {
        &self.form
    }

    pub fn draft(&self) -> Option<&EditingDraft> {
        self.draft.as_ref()
    }

    fn admin_session(&self) -> Result<Session, EditorError> {
        match self.gate.session() {
            Some(session) if self.gate.admin_email().matches(Some(&session)) => Ok(session),
            _ => Err(EditorError::NotAdmin),
        }
    }

    /// Whether the session that issued a request is still the current one.
    fn still_current(&self, issuer: &Session) -> bool {
        self.gate
            .session()
            .is_some_and(|current| current.uid() == issuer.uid())
    }

    pub async fn create(&mut self, title: &str, content: &str) -> Result<String, EditorError> {
        if self.draft.is_some() {
            return Err(EditorError::Validation(messages::FINISH_EDITING_FIRST));
        }

        // Keep what was typed so a failed attempt can be retried.
        self.form = PostForm {
            title: title.to_string(),
            content: content.to_string(),
        };

        if is_blank(title) || is_blank(content) {
            return Err(EditorError::Validation(messages::TITLE_AND_CONTENT_REQUIRED));
        }
        let session = self.admin_session()?;
        let author = session.email().unwrap_or_default().to_string();

        let post = NewPost {
            title: title.to_string(),
            content: content.to_string(),
            author,
            created_at: Utc::now(),
        };

        match self.store.create(&self.path, post).await {
            Ok(id) => {
                tracing::info!(post_id = %id, "Post created");
                if !self.still_current(&session) {
                    tracing::warn!(post_id = %id, "Session changed during create; keeping form");
                    return Err(EditorError::SessionChanged(WriteOp::Create));
                }
                self.form = PostForm::default();
                Ok(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create post");
                Err(EditorError::write(WriteOp::Create, e))
            }
        }
    }

    /// Starts editing a copy of `post`; the create form is unavailable until
    /// the draft is updated or cancelled.
    pub fn begin_edit(&mut self, post: Post) {
        tracing::debug!(post_id = %post.id, "Editing post");
        self.draft = Some(EditingDraft {
            title: post.title.clone(),
            content: post.content.clone(),
            original: post,
        });
    }

    /// Replaces the draft's pending title and content.
    pub fn revise(&mut self, title: &str, content: &str) -> Result<(), EditorError> {
        let draft = self
            .draft
            .as_mut()
            .ok_or(EditorError::Validation(messages::SELECT_POST_TO_EDIT))?;
        draft.title = title.to_string();
        draft.content = content.to_string();
        Ok(())
    }

    pub async fn update(&mut self) -> Result<(), EditorError> {
        let draft = match &self.draft {
            Some(draft) if !is_blank(&draft.title) && !is_blank(&draft.content) => draft.clone(),
            _ => return Err(EditorError::Validation(messages::SELECT_POST_TO_EDIT)),
        };
        let session = self.admin_session()?;

        let patch = PostPatch {
            title: draft.title.clone(),
            content: draft.content.clone(),
        };

        match self.store.update(&self.path, draft.id(), patch).await {
            Ok(()) => {
                tracing::info!(post_id = %draft.id(), "Post updated");
                if !self.still_current(&session) {
                    tracing::warn!(post_id = %draft.id(), "Session changed during update; keeping draft");
                    return Err(EditorError::SessionChanged(WriteOp::Update));
                }
                self.draft = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(post_id = %draft.id(), error = %e, "Failed to update post");
                Err(EditorError::write(WriteOp::Update, e))
            }
        }
    }

    pub fn cancel_edit(&mut self) {
        if let Some(draft) = self.draft.take() {
            tracing::debug!(post_id = %draft.id(), "Edit cancelled");
        }
    }

    /// Deletes after `confirm` agrees. A declined confirmation sends nothing.
    pub async fn delete<C>(&mut self, id: &str, confirm: &C) -> Result<DeleteOutcome, EditorError>
    where
        C: Confirm + ?Sized,
    {
        self.admin_session()?;

        if !confirm.confirm(messages::CONFIRM_DELETE) {
            tracing::debug!(post_id = %id, "Delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        match self.store.delete(&self.path, id).await {
            Ok(()) => {
                tracing::info!(post_id = %id, "Post deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                tracing::error!(post_id = %id, error = %e, "Failed to delete post");
                Err(EditorError::write(WriteOp::Delete, e))
            }
        }
    }
}
