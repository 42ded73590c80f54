//! Agent error types.

use shopassist_core::StorageError;
use shopassist_providers::ProviderError;
use thiserror::Error;

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tool not found.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution error.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Completion service failure.
    #[error("Model API error: {0}")]
    Provider(#[from] ProviderError),

    /// The completion service reported an error inside the stream.
    #[error("Model API error: {0}")]
    ModelApi(String),

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a tool execution error.
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a model API error.
    pub fn model_api(msg: impl Into<String>) -> Self {
        Self::ModelApi(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }
}
