use crate::messages;
use thiserror::Error;

/// Failures reported by the identity provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Account disabled")]
    Disabled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected identity provider response: {0}")]
    Unexpected(String),
}

impl AuthError {
    pub fn localized_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential | AuthError::Unexpected(_) => messages::LOGIN_FAILED,
            AuthError::Disabled => messages::LOGIN_DISABLED,
            AuthError::Network(_) => messages::LOGIN_UNAVAILABLE,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Unexpected(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

/// Failures reported by the document store, for writes and live queries alike.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected document store response: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Unexpected(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOp::Create => write!(f, "create"),
            WriteOp::Update => write!(f, "update"),
            WriteOp::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditorError {
    /// Rejected locally; no remote call was made.
    #[error("Validation error: {0}")]
    Validation(&'static str),

    #[error("Administrator session required")]
    NotAdmin,

    #[error("Session changed while the {0} request was in flight")]
    SessionChanged(WriteOp),

    #[error("Failed to {op} post: {source}")]
    Write {
        op: WriteOp,
        #[source]
        source: StoreError,
    },
}

impl EditorError {
    pub fn write(op: WriteOp, source: StoreError) -> Self {
        EditorError::Write { op, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EditorError::Validation(_))
    }

    pub fn localized_message(&self) -> &'static str {
        match self {
            EditorError::Validation(message) => message,
            EditorError::NotAdmin => messages::ADMIN_REQUIRED,
            EditorError::SessionChanged(_) => messages::SESSION_CHANGED,
            EditorError::Write { op, .. } => match op {
                WriteOp::Create => messages::CREATE_FAILED,
                WriteOp::Update => messages::UPDATE_FAILED,
                WriteOp::Delete => messages::DELETE_FAILED,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to build backend client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
