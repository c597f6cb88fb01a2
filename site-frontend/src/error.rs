use crate::views::ErrorTemplate;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use site_core::error::{ConfigError, EditorError};
use site_core::messages;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Session error: {0}")]
    Session(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Editor(err) => editor_status(err),
            AppError::Session(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Editor(err) => err.localized_message().to_string(),
            AppError::NotFound(what) => format!("غير موجود: {}", what),
            AppError::Session(_) | AppError::Config(_) => messages::UNEXPECTED_ERROR.to_string(),
        }
    }
}

/// Status code for a rejected editor command.
pub fn editor_status(err: &EditorError) -> StatusCode {
    match err {
        EditorError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EditorError::NotAdmin => StatusCode::FORBIDDEN,
        EditorError::SessionChanged(_) => StatusCode::CONFLICT,
        EditorError::Write { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let page = ErrorTemplate {
            message: self.message(),
        };
        (status, page).into_response()
    }
}
