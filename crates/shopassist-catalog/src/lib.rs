//! Product retrieval for ShopAssist.
//!
//! This crate provides:
//! - Price constraint parsing for free-form shopper queries
//! - Keyword, semantic and product-name matchers over a store's catalog
//! - The retrieval engine that combines them into one tool-shaped result
//! - Embedding generation and the job that keeps product embeddings fresh

pub mod embeddings;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod price;
pub mod search;

pub use embeddings::{euclidean_distance, EmbeddingClient, OpenAIEmbeddings};
pub use engine::{
    ProductSummary, RetrievalEngine, SearchMetadata, SearchOutcome, SearchRequest, SearchType,
    MAX_RESULTS_CAP,
};
pub use error::CatalogError;
pub use indexer::{embedding_text, BatchReport, EmbeddingIndexer, IndexerConfig, RegenerateReport};
pub use price::PriceRange;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
