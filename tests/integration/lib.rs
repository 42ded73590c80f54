//! Shared fixtures for the ShopAssist integration tests.

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use futures::stream;
use shopassist_agent::{ChatOrchestrator, SearchProductsTool, ToolRegistry};
use shopassist_catalog::{EmbeddingClient, EmbeddingIndexer, IndexerConfig, RetrievalEngine};
use shopassist_core::config::GatewayConfig;
use shopassist_core::{Product, ProductStatus, SecretString};
use shopassist_gateway::{Gateway, GatewayState};
use shopassist_providers::{
    ChatOptions, CompletionStream, Message, Provider, ProviderError, StopReason, StreamEvent,
    ToolUse, Usage,
};
use shopassist_storage::{SqliteBackend, Storage};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const STORE: &str = "acme.myshopify.com";
pub const ADMIN_TOKEN: &str = "owner-token";

/// An active, saleable product with stock on hand.
pub fn product(id: &str, title: &str, price: f64) -> Product {
    Product {
        id: id.to_string(),
        store_id: STORE.to_string(),
        title: title.to_string(),
        description: None,
        handle: id.to_string(),
        product_type: None,
        vendor: None,
        tags: BTreeSet::new(),
        price_min: price,
        price_max: price,
        available_for_sale: true,
        status: ProductStatus::Active,
        total_inventory: 5,
        image_url: None,
        image_urls: Vec::new(),
        embedding: None,
        sync_version: 0,
        updated_at: Utc::now(),
    }
}

pub fn tagged(mut product: Product, tags: &[&str]) -> Product {
    product.tags = tags.iter().map(|t| t.to_string()).collect();
    product
}

/// A SQLite-backed storage in a fresh temporary directory.
pub async fn sqlite_storage() -> (Storage, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let backend = SqliteBackend::open(&dir.path().join("shopassist.db"), 4)
        .await
        .expect("open sqlite");
    (Storage::from_sqlite(backend), dir)
}

/// Deterministic bag-of-words embedder. Shared words mean nearby vectors.
pub struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dimension: 256,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
            .map(str::to_lowercase)
        {
            let bucket = token
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbedder {
    fn model(&self) -> &str {
        "hash-bow"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> shopassist_catalog::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// One scripted completion step.
#[derive(Clone)]
pub enum Step {
    Reply(Vec<StreamEvent>),
    Fail,
}

pub fn text_reply(chunks: &[&str]) -> Step {
    let mut events: Vec<StreamEvent> = chunks
        .iter()
        .map(|c| StreamEvent::ContentDelta {
            delta: c.to_string(),
        })
        .collect();
    events.push(StreamEvent::End {
        stop_reason: StopReason::EndTurn,
        usage: Usage::default(),
    });
    Step::Reply(events)
}

pub fn search_call(id: &str, query: &str) -> Step {
    Step::Reply(vec![
        StreamEvent::ToolCall(ToolUse {
            id: id.to_string(),
            name: "searchProducts".to_string(),
            input: serde_json::json!({ "query": query, "storeId": STORE }),
        }),
        StreamEvent::End {
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        },
    ])
}

/// Plays back steps in order, then keeps repeating the last one.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    requests: Mutex<Vec<(Vec<Message>, ChatOptions)>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<(Vec<Message>, ChatOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat_stream(
        &self,
        _model: &str,
        messages: &[Message],
        options: ChatOptions,
    ) -> shopassist_providers::Result<CompletionStream> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), options));

        let next = self.steps.lock().unwrap().pop_front();
        let step = match next {
            Some(step) => {
                *self.last.lock().unwrap() = Some(step.clone());
                step
            }
            None => self.last.lock().unwrap().clone().expect("empty script"),
        };

        match step {
            Step::Reply(events) => Ok(Box::pin(stream::iter(events.into_iter().map(Ok)))),
            Step::Fail => Err(ProviderError::upstream(503, "upstream overloaded")),
        }
    }
}

/// Everything a test needs, wired the way `shopassist serve` wires it.
pub struct Harness {
    pub storage: Storage,
    pub provider: Arc<ScriptedProvider>,
    pub embedder: Arc<HashEmbedder>,
    pub engine: Arc<RetrievalEngine>,
    pub indexer: Arc<EmbeddingIndexer>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl Harness {
    pub async fn new(storage: Storage, steps: Vec<Step>) -> Self {
        let provider = ScriptedProvider::new(steps);
        let embedder = HashEmbedder::new();

        let engine = Arc::new(RetrievalEngine::new(
            storage.catalog.clone(),
            embedder.clone(),
        ));
        let indexer = Arc::new(EmbeddingIndexer::new(
            storage.catalog.clone(),
            embedder.clone(),
            IndexerConfig {
                batch_size: 50,
                regenerate_batch_size: 2,
                delay: Duration::ZERO,
            },
        ));

        let tools = Arc::new(ToolRegistry::new());
        tools
            .register(Arc::new(SearchProductsTool::new(engine.clone())))
            .await;
        let orchestrator = Arc::new(ChatOrchestrator::new(
            provider.clone(),
            tools,
            storage.stores.clone(),
            storage.conversations.clone(),
            storage.catalog.clone(),
        ));

        Self {
            storage,
            provider,
            embedder,
            engine,
            indexer,
            orchestrator,
        }
    }

    pub async fn in_memory(steps: Vec<Step>) -> Self {
        Self::new(Storage::in_memory(), steps).await
    }

    pub async fn seed(&self, products: Vec<Product>) {
        for product in products {
            self.storage
                .catalog
                .upsert_product(product)
                .await
                .expect("seed product");
        }
    }

    /// The HTTP router with admin access enabled via [`ADMIN_TOKEN`].
    pub fn router(&self) -> Router {
        self.router_with_token(Some(ADMIN_TOKEN))
    }

    pub fn router_with_token(&self, admin_token: Option<&str>) -> Router {
        let state = GatewayState {
            orchestrator: self.orchestrator.clone(),
            indexer: self.indexer.clone(),
            stores: self.storage.stores.clone(),
            admin_token: admin_token.map(SecretString::from),
        };
        Gateway::new(GatewayConfig::default(), state).router()
    }
}
