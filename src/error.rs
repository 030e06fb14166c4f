//! User-visible error taxonomy.
//!
//! Internal plumbing uses `anyhow`; at component boundaries failures are
//! classified into [`AssistantError`] so callers (CLI, HTTP) can report a
//! stable machine-readable code alongside the message.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    /// Bad caller input: missing root folder, missing source, bad strategy.
    #[error("{0}")]
    InvalidInput(String),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("vector store error: {0:#}")]
    Store(anyhow::Error),
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    #[error("completion failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;

impl AssistantError {
    /// Stable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            AssistantError::InvalidInput(_) => "bad_request",
            AssistantError::ProjectNotFound(_) => "not_found",
            AssistantError::Store(_) => "store_unavailable",
            AssistantError::Embedding(_) => "embedding_failed",
            AssistantError::Completion(_) => "completion_failed",
            AssistantError::Io(_) | AssistantError::Internal(_) => "internal",
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

/// `{ "error": { "code", "message" } }`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
