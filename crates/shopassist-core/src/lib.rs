//! # shopassist-core
//!
//! Core types, configuration, and repository interfaces for ShopAssist.
//!
//! This crate provides shared functionality used across all ShopAssist crates:
//!
//! - **Configuration**: Loading and validating the JSON5 config file
//! - **Types**: Stores, products, conversations and messages
//! - **Repositories**: Async traits the storage backends implement

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod repository;
pub mod secret;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, StorageError};
pub use repository::{
    CatalogRepository, ConversationRepository, NewConversation, StorageResult, StoreRepository,
};
pub use secret::SecretString;
pub use types::*;
