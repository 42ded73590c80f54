//! Completion service errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Failures talking to the completion API.
///
/// Everything except `Configuration` means the upstream service could not
/// produce a complete reply; the gateway reports all of them as upstream
/// errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No usable credential or client. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The API refused the credential (401/403).
    #[error("Completion API rejected the credential: {0}")]
    Unauthorized(String),

    /// Any other non-success answer. Rate limits carry `Retry-After` seconds.
    #[error("Upstream error ({status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        retry_after: Option<u64>,
    },

    /// Transport failure before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The event stream broke, or ended before the model finished.
    #[error("Stream interrupted: {0}")]
    Stream(String),
}

impl ProviderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// A 429 answer.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::Upstream {
            status: 429,
            message: message.into(),
            retry_after,
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Whether the same request could succeed later: throttling, 5xx and
    /// transport failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Http(_) | Self::Stream(_) => true,
            Self::Configuration(_) | Self::Unauthorized(_) => false,
        }
    }
}
