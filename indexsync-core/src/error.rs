//! Error types for indexsync operations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structured error payload shared between the service and the CLI.
///
/// Used as the HTTP error body in indexsync-service and printed by the CLI
/// in `--json` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self::new("internal_error", msg, "Check service logs for details")
    }
}

impl From<&SyncError> for ErrorEnvelope {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::MissingField(_) | SyncError::InvalidPattern(_) => Self::new(
                "malformed_event",
                err.to_string(),
                "Check the event payload against its routing key",
            ),
            SyncError::SessionOpen(_) => Self::new(
                "repository_unavailable",
                err.to_string(),
                "The event can be redelivered once the repository is reachable",
            ),
            _ => Self::internal(&err.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to open repository session: {0}")]
    SessionOpen(String),

    #[error("Entity not found in repository: {0}")]
    EntityNotFound(String),

    #[error("Invalid repository timestamp {value:?} for {path}")]
    InvalidTimestamp { path: String, value: String },

    #[error("Event payload is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Document already exists: {kind}/{id}")]
    DuplicateDocument { kind: &'static str, id: String },

    #[error("Document not found: {kind}/{id}")]
    DocumentNotFound { kind: &'static str, id: String },

    #[error("Store returned {status} for {operation}: {body}")]
    StoreResponse {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config already exists at {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
