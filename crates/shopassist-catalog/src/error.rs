//! Catalog error types.

use shopassist_core::StorageError;
use thiserror::Error;

/// Errors that can occur during retrieval and embedding maintenance.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required credential or setting is missing. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The embedding API answered with a non-success status.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The embedding API answered successfully but the payload was unusable.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Malformed search input.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CatalogError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Non-success answer from the embedding API.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
