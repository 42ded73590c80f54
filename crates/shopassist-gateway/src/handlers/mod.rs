//! HTTP request handlers.

pub mod chat;
pub mod conversation;
pub mod embeddings;
pub mod health;
pub mod store;

use crate::error::GatewayError;
use crate::Result;
use axum::http::HeaderValue;
use serde::Deserialize;

/// Query parameters the storefront proxy attaches to every request.
#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    pub shop: Option<String>,
    pub logged_in_customer_id: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

impl ShopQuery {
    /// The shop domain, trimmed. Missing or blank is a client error.
    pub fn require_shop(&self) -> Result<String> {
        self.shop
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| GatewayError::validation("Missing shop parameter"))
    }

    pub fn customer_id(&self) -> Option<String> {
        header_safe(self.logged_in_customer_id.clone())
    }
}

/// Identity values end up in the `x-session-id` header; anything that could
/// not be sent there is treated as absent.
pub(crate) fn header_safe(value: Option<String>) -> Option<String> {
    value.filter(|v| HeaderValue::from_str(v).is_ok())
}
