//! Repository interfaces implemented by the storage backends.
//!
//! The retrieval engine, embedding job and conversation layer only talk to
//! these traits, so the SQLite and in-memory backends are interchangeable.

use crate::error::StorageError;
use crate::types::{
    AiConfig, CatalogStatus, ChatMessage, Conversation, Product, ProductEmbedding, ProductScope,
    Role, SessionType, Store,
};
use async_trait::async_trait;

/// Result type for repository operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Product reads, embedding writes and the sync collaborator's upsert path.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert or replace a product, bumping its sync version.
    ///
    /// When the fields that feed the embedding text change, the stored
    /// embedding is dropped so the maintenance job picks the product up again.
    async fn upsert_product(&self, product: Product) -> StorageResult<Product>;

    /// Fetch a single product.
    async fn get_product(&self, store_id: &str, product_id: &str)
        -> StorageResult<Option<Product>>;

    /// All products of a store matching `scope`, in no particular order.
    async fn scan_products(&self, store_id: &str, scope: ProductScope)
        -> StorageResult<Vec<Product>>;

    /// Active, saleable products without an embedding, oldest update first.
    async fn products_needing_embedding(
        &self,
        store_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<Product>>;

    /// Write vector, model, timestamp and metadata in one step.
    async fn save_embedding(
        &self,
        store_id: &str,
        product_id: &str,
        embedding: ProductEmbedding,
    ) -> StorageResult<()>;

    /// Clear every embedding in a store. Returns the number of products touched.
    async fn clear_embeddings(&self, store_id: &str) -> StorageResult<u64>;

    /// Counts used by the embedding status endpoint.
    async fn catalog_status(&self, store_id: &str) -> StorageResult<CatalogStatus>;
}

/// Tenant records.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn find_store(&self, domain: &str) -> StorageResult<Option<Store>>;

    /// Return the store, creating a minimal record on first contact.
    ///
    /// Concurrent first contacts collapse onto a single row.
    async fn ensure_store(&self, domain: &str) -> StorageResult<Store>;

    /// Replace a store's assistant configuration.
    async fn update_ai_config(&self, domain: &str, ai_config: AiConfig) -> StorageResult<Store>;
}

/// Fields needed to open a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub store_id: String,
    pub session_id: String,
    pub session_type: SessionType,
    pub customer_id: Option<String>,
}

/// Conversation and message log.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_conversation(
        &self,
        store_id: &str,
        session_id: &str,
    ) -> StorageResult<Option<Conversation>>;

    /// Create a conversation. If one already exists for the
    /// `(store_id, session_id)` pair, the existing row is returned instead.
    async fn create_conversation(&self, new: NewConversation) -> StorageResult<Conversation>;

    /// Append a message and advance the conversation's `last_message_at`.
    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> StorageResult<ChatMessage>;

    /// Messages in creation order.
    async fn messages(&self, conversation_id: &str) -> StorageResult<Vec<ChatMessage>>;
}
