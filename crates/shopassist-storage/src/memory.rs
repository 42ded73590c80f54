//! In-process repository backend.

use async_trait::async_trait;
use chrono::Utc;
use shopassist_core::repository::NewConversation;
use shopassist_core::types::needs_embedding;
use shopassist_core::{
    AiConfig, CatalogRepository, CatalogStatus, ChatMessage, Conversation,
    ConversationRepository, Product, ProductEmbedding, ProductScope, Role, StorageError,
    StorageResult, Store, StoreRepository,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    stores: HashMap<String, Store>,
    /// Keyed by (store_id, product_id).
    products: HashMap<(String, String), Product>,
    conversations: HashMap<String, Conversation>,
    /// (store_id, session_id) -> conversation id.
    sessions: HashMap<(String, String), String>,
    messages: HashMap<String, Vec<ChatMessage>>,
}

/// Repository backend holding everything in memory.
///
/// One lock guards all maps, so every operation is atomic with respect to
/// the others, including the lookup-then-insert of the create paths.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(store_id: &str, id: &str) -> (String, String) {
    (store_id.to_string(), id.to_string())
}

#[async_trait]
impl CatalogRepository for MemoryBackend {
    async fn upsert_product(&self, mut product: Product) -> StorageResult<Product> {
        let mut state = self.state.write().await;
        let k = key(&product.store_id, &product.id);

        match state.products.get(&k) {
            Some(existing) => {
                product.sync_version = existing.sync_version.max(product.sync_version) + 1;
                product.embedding = if product.embedding_input_changed(existing) {
                    None
                } else {
                    existing.embedding.clone()
                };
            }
            None => {
                product.sync_version = product.sync_version.max(0) + 1;
                product.embedding = None;
            }
        }
        product.updated_at = Utc::now();

        state.products.insert(k, product.clone());
        Ok(product)
    }

    async fn get_product(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> StorageResult<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&key(store_id, product_id)).cloned())
    }

    async fn scan_products(
        &self,
        store_id: &str,
        scope: ProductScope,
    ) -> StorageResult<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|p| p.store_id == store_id && scope.includes(p))
            .cloned()
            .collect())
    }

    async fn products_needing_embedding(
        &self,
        store_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<Product>> {
        let state = self.state.read().await;
        let mut pending: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.store_id == store_id && needs_embedding(p))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn save_embedding(
        &self,
        store_id: &str,
        product_id: &str,
        embedding: ProductEmbedding,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&key(store_id, product_id))
            .ok_or_else(|| StorageError::not_found("Product", product_id))?;
        product.embedding = Some(embedding);
        Ok(())
    }

    async fn clear_embeddings(&self, store_id: &str) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        let mut cleared = 0;
        for product in state.products.values_mut() {
            if product.store_id == store_id && product.embedding.take().is_some() {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn catalog_status(&self, store_id: &str) -> StorageResult<CatalogStatus> {
        let state = self.state.read().await;
        let mut status = CatalogStatus::default();
        for p in state.products.values().filter(|p| p.store_id == store_id) {
            status.total += 1;
            if p.is_active() {
                status.active += 1;
            }
            if p.is_in_stock() {
                status.in_stock += 1;
            }
            if p.has_embedding() {
                status.embedded += 1;
            }
            if needs_embedding(p) {
                status.pending += 1;
            }
        }
        Ok(status)
    }
}

#[async_trait]
impl StoreRepository for MemoryBackend {
    async fn find_store(&self, domain: &str) -> StorageResult<Option<Store>> {
        Ok(self.state.read().await.stores.get(domain).cloned())
    }

    async fn ensure_store(&self, domain: &str) -> StorageResult<Store> {
        let mut state = self.state.write().await;
        let store = state
            .stores
            .entry(domain.to_string())
            .or_insert_with(|| Store::minimal(domain));
        Ok(store.clone())
    }

    async fn update_ai_config(&self, domain: &str, ai_config: AiConfig) -> StorageResult<Store> {
        let mut state = self.state.write().await;
        let store = state
            .stores
            .get_mut(domain)
            .ok_or_else(|| StorageError::not_found("Store", domain))?;
        store.ai_config = ai_config;
        store.updated_at = Utc::now();
        Ok(store.clone())
    }
}

#[async_trait]
impl ConversationRepository for MemoryBackend {
    async fn find_conversation(
        &self,
        store_id: &str,
        session_id: &str,
    ) -> StorageResult<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(&key(store_id, session_id))
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn create_conversation(&self, new: NewConversation) -> StorageResult<Conversation> {
        let mut state = self.state.write().await;
        let k = key(&new.store_id, &new.session_id);

        if let Some(existing) = state.sessions.get(&k).and_then(|id| state.conversations.get(id)) {
            return Ok(existing.clone());
        }

        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            store_id: new.store_id,
            session_id: new.session_id,
            session_type: new.session_type,
            customer_id: new.customer_id,
            created_at: Utc::now(),
            last_message_at: None,
        };
        state.sessions.insert(k, conversation.id.clone());
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> StorageResult<ChatMessage> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let conversation = state
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StorageError::not_found("Conversation", conversation_id))?;
        conversation.last_message_at = Some(now);

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        };
        state
            .messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn messages(&self, conversation_id: &str) -> StorageResult<Vec<ChatMessage>> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}
