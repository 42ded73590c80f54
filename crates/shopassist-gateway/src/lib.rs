//! HTTP gateway for ShopAssist.
//!
//! This crate provides:
//! - The streaming chat endpoint used by the storefront widget
//! - Conversation history lookup
//! - Store-owner endpoints for embedding maintenance and assistant settings

pub mod error;
pub mod handlers;
pub mod server;

pub use error::GatewayError;
pub use server::{Gateway, GatewayState};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
