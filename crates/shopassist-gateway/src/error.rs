//! Gateway error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shopassist_agent::AgentError;
use shopassist_catalog::CatalogError;
use shopassist_core::StorageError;
use thiserror::Error;
use tracing::error;

/// Errors that can occur in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request body.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed request.
    #[error("{0}")]
    Validation(String),

    /// Missing or wrong credentials.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Admin access is not enabled on this gateway.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Chat orchestration error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Retrieval or embedding error.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Persistence error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Agent(e) => match e {
                AgentError::Validation(_) => StatusCode::BAD_REQUEST,
                AgentError::Storage(s) if s.is_not_found() => StatusCode::NOT_FOUND,
                AgentError::Provider(_) | AgentError::ModelApi(_) => StatusCode::BAD_GATEWAY,
                AgentError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(e) => match e {
                CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
                CatalogError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                CatalogError::Upstream { .. } | CatalogError::Http(_) => StatusCode::BAD_GATEWAY,
                CatalogError::Storage(s) if s.is_not_found() => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Io(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "invalid_request",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::BAD_GATEWAY => "upstream_error",
            StatusCode::SERVICE_UNAVAILABLE => "not_configured",
            _ => "internal_error",
        }
    }

    /// Message safe to show to the caller.
    fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "The assistant is temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.public_message(),
            }
        });
        (status, Json(body)).into_response()
    }
}
