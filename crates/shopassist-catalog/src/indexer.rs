//! Embedding maintenance job.
//!
//! Picks up active, saleable products that have no embedding, builds a
//! deterministic text for each, and stores the resulting vector. Calls are
//! spaced by a fixed delay to stay under the embedding API's rate limit.

use crate::embeddings::EmbeddingClient;
use crate::error::CatalogError;
use crate::Result;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use shopassist_core::config::EmbeddingsConfig;
use shopassist_core::{CatalogRepository, CatalogStatus, Product, ProductEmbedding};
use std::sync::Arc;
use std::time::Duration;

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const SEPARATOR: &str = " | ";
const DESCRIPTION_CHARS: usize = 500;

/// Batch sizing and pacing.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub batch_size: usize,
    pub regenerate_batch_size: usize,
    pub delay: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self::from(&EmbeddingsConfig::default())
    }
}

impl From<&EmbeddingsConfig> for IndexerConfig {
    fn from(config: &EmbeddingsConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            regenerate_batch_size: config.regenerate_batch_size.max(1),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Products selected.
    pub processed: usize,
    pub embedded: usize,
    /// Products left unembedded because their call failed.
    pub failed: usize,
}

/// Outcome of a full regeneration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateReport {
    pub cleared: u64,
    pub passes: usize,
    pub total_embedded: usize,
    pub failed: usize,
}

/// Keeps product embeddings current.
pub struct EmbeddingIndexer {
    catalog: Arc<dyn CatalogRepository>,
    embeddings: Arc<dyn EmbeddingClient>,
    config: IndexerConfig,
}

impl EmbeddingIndexer {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        embeddings: Arc<dyn EmbeddingClient>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            catalog,
            embeddings,
            config,
        }
    }

    /// Embed up to `batch_size` pending products.
    pub async fn generate(&self, store_id: &str) -> Result<BatchReport> {
        self.run_batch(store_id, self.config.batch_size).await
    }

    /// Embed up to `limit` pending products. A failed call leaves that
    /// product pending and moves on; a missing credential fails up front.
    pub async fn run_batch(&self, store_id: &str, limit: usize) -> Result<BatchReport> {
        self.ensure_configured()?;
        let mut called = false;
        self.embed_pending(store_id, limit, &mut called).await
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.embeddings.is_configured() {
            Ok(())
        } else {
            Err(CatalogError::config(
                "Embedding credential is not configured",
            ))
        }
    }

    /// `called` spans every batch of one run so the delay also separates the
    /// last call of a pass from the first call of the next.
    async fn embed_pending(
        &self,
        store_id: &str,
        limit: usize,
        called: &mut bool,
    ) -> Result<BatchReport> {
        let pending = self
            .catalog
            .products_needing_embedding(store_id, limit)
            .await?;
        let mut report = BatchReport {
            processed: pending.len(),
            ..BatchReport::default()
        };

        for product in &pending {
            if *called && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
            *called = true;

            match self.embed_product(product).await {
                Ok(()) => report.embedded += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        store_id,
                        product_id = %product.id,
                        error = %e,
                        "Failed to embed product"
                    );
                }
            }
        }

        tracing::info!(
            store_id,
            processed = report.processed,
            embedded = report.embedded,
            failed = report.failed,
            "Embedding batch finished"
        );
        Ok(report)
    }

    async fn embed_product(&self, product: &Product) -> Result<()> {
        let text = embedding_text(product);
        let vector = self.embeddings.embed(&text).await?;
        let embedding = ProductEmbedding {
            metadata: serde_json::json!({
                "embedding_text": text,
                "embedding_length": vector.len(),
            }),
            vector,
            model: self.embeddings.model().to_string(),
            embedded_at: Utc::now(),
        };
        self.catalog
            .save_embedding(&product.store_id, &product.id, embedding)
            .await?;
        Ok(())
    }

    /// Clear every embedding in the store, then run batches until one
    /// embeds nothing.
    pub async fn regenerate_all(&self, store_id: &str) -> Result<RegenerateReport> {
        self.ensure_configured()?;

        let mut report = RegenerateReport {
            cleared: self.catalog.clear_embeddings(store_id).await?,
            ..RegenerateReport::default()
        };
        tracing::info!(store_id, cleared = report.cleared, "Cleared embeddings");

        let mut called = false;
        loop {
            let batch = self
                .embed_pending(store_id, self.config.regenerate_batch_size, &mut called)
                .await?;
            report.passes += 1;
            report.total_embedded += batch.embedded;
            report.failed = batch.failed;
            if batch.embedded == 0 {
                break;
            }
        }

        tracing::info!(
            store_id,
            passes = report.passes,
            total_embedded = report.total_embedded,
            "Embedding regeneration finished"
        );
        Ok(report)
    }

    pub async fn status(&self, store_id: &str) -> Result<CatalogStatus> {
        Ok(self.catalog.catalog_status(store_id).await?)
    }
}

/// The text a product is embedded from.
///
/// Title, category, brand, cleaned description, tags and price, joined by
/// `" | "`. Empty parts are left out.
pub fn embedding_text(product: &Product) -> String {
    let mut parts = vec![product.title.trim().to_string()];

    if let Some(kind) = non_blank(product.product_type.as_deref()) {
        parts.push(format!("Category: {}", kind));
    }
    if let Some(vendor) = non_blank(product.vendor.as_deref()) {
        parts.push(format!("Brand: {}", vendor));
    }
    if let Some(description) = product.description.as_deref() {
        let cleaned = clean_description(description);
        if !cleaned.is_empty() {
            parts.push(cleaned);
        }
    }
    if !product.tags.is_empty() {
        let tags: Vec<&str> = product.tags.iter().map(String::as_str).collect();
        parts.push(format!("Features: {}", tags.join(", ")));
    }
    if (product.price_min - product.price_max).abs() < f64::EPSILON {
        parts.push(format!("Price: ${:.2}", product.price_min));
    } else {
        parts.push(format!(
            "Price: ${:.2} - ${:.2}",
            product.price_min, product.price_max
        ));
    }

    parts.join(SEPARATOR)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn clean_description(raw: &str) -> String {
    let stripped = MARKUP.replace_all(raw, "");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    collapsed.trim().chars().take(DESCRIPTION_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shopassist_core::ProductStatus;
    use shopassist_storage::MemoryBackend;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STORE: &str = "acme.myshopify.com";

    /// Fails for any text containing "poison"; counts calls.
    struct CountingEmbedder {
        calls: AtomicUsize,
        configured: bool,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                configured: true,
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedder {
        fn model(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            if texts.iter().any(|t| t.contains("poison")) {
                return Err(CatalogError::upstream(500, "boom"));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn product(id: &str, title: &str) -> Product {
        Product {
            id: id.to_string(),
            store_id: STORE.to_string(),
            title: title.to_string(),
            description: None,
            handle: id.to_string(),
            product_type: None,
            vendor: None,
            tags: BTreeSet::new(),
            price_min: 25.0,
            price_max: 25.0,
            available_for_sale: true,
            status: ProductStatus::Active,
            total_inventory: 1,
            image_url: None,
            image_urls: Vec::new(),
            embedding: None,
            sync_version: 0,
            updated_at: Utc::now(),
        }
    }

    async fn indexer(
        products: Vec<Product>,
        embedder: Arc<CountingEmbedder>,
        batch: usize,
    ) -> (EmbeddingIndexer, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        for p in products {
            backend.upsert_product(p).await.unwrap();
        }
        let config = IndexerConfig {
            batch_size: batch,
            regenerate_batch_size: batch,
            delay: Duration::ZERO,
        };
        (
            EmbeddingIndexer::new(backend.clone(), embedder, config),
            backend,
        )
    }

    #[test]
    fn test_embedding_text_full() {
        let mut p = product("p1", "Trail Runner");
        p.product_type = Some("Shoes".to_string());
        p.vendor = Some("Peak".to_string());
        p.description = Some("<p>Light   and\n<b>fast</b></p>".to_string());
        p.tags = ["grip", "breathable"].iter().map(|t| t.to_string()).collect();
        p.price_min = 80.0;
        p.price_max = 95.5;

        assert_eq!(
            embedding_text(&p),
            "Trail Runner | Category: Shoes | Brand: Peak | Light and fast | \
             Features: breathable, grip | Price: $80.00 - $95.50"
        );
    }

    #[test]
    fn test_embedding_text_minimal_and_truncated() {
        let mut p = product("p1", "Mug");
        assert_eq!(embedding_text(&p), "Mug | Price: $25.00");

        p.description = Some("é".repeat(600));
        let text = embedding_text(&p);
        let description = text.split(SEPARATOR).nth(1).unwrap();
        assert_eq!(description.chars().count(), DESCRIPTION_CHARS);
    }

    #[tokio::test]
    async fn test_batch_skips_failures_and_records_metadata() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (indexer, backend) = indexer(
            vec![product("a", "Mug"), product("b", "poison Mug"), product("c", "Bowl")],
            embedder.clone(),
            10,
        )
        .await;

        let report = indexer.generate(STORE).await.unwrap();
        assert_eq!(
            report,
            BatchReport {
                processed: 3,
                embedded: 2,
                failed: 1
            }
        );

        let a = backend.get_product(STORE, "a").await.unwrap().unwrap();
        let embedding = a.embedding.unwrap();
        assert_eq!(embedding.model, "counting");
        assert_eq!(embedding.metadata["embedding_text"], "Mug | Price: $25.00");
        assert_eq!(embedding.metadata["embedding_length"], 2);

        let b = backend.get_product(STORE, "b").await.unwrap().unwrap();
        assert!(!b.has_embedding());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (indexer, _) = indexer(
            vec![product("a", "Mug"), product("b", "Bowl")],
            embedder.clone(),
            10,
        )
        .await;

        assert_eq!(indexer.generate(STORE).await.unwrap().embedded, 2);
        let calls = embedder.calls.load(Ordering::SeqCst);

        let again = indexer.generate(STORE).await.unwrap();
        assert_eq!(again.embedded, 0);
        assert_eq!(again.processed, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_regenerate_all_reaches_fixpoint() {
        let embedder = Arc::new(CountingEmbedder::new());
        let products = (0..5).map(|i| product(&format!("p{}", i), "Cup")).collect();
        let (indexer, backend) = indexer(products, embedder, 2).await;

        indexer.generate(STORE).await.unwrap();
        let report = indexer.regenerate_all(STORE).await.unwrap();
        assert_eq!(report.cleared, 2);
        assert_eq!(report.total_embedded, 5);
        assert_eq!(report.passes, 4);

        let status = backend.catalog_status(STORE).await.unwrap();
        assert_eq!(status.embedded, 5);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn test_regenerate_terminates_when_everything_fails() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (indexer, _) = indexer(vec![product("a", "poison")], embedder, 5).await;

        let report = indexer.regenerate_all(STORE).await.unwrap();
        assert_eq!(report.passes, 1);
        assert_eq!(report.total_embedded, 0);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_up_front() {
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            configured: false,
        });
        let (indexer, _) = indexer(vec![product("a", "Mug")], embedder.clone(), 5).await;

        let err = indexer.generate(STORE).await.unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_delay() {
        let backend = Arc::new(MemoryBackend::new());
        for id in ["a", "b", "c"] {
            backend.upsert_product(product(id, "Mug")).await.unwrap();
        }
        let indexer = EmbeddingIndexer::new(
            backend,
            Arc::new(CountingEmbedder::new()),
            IndexerConfig {
                batch_size: 10,
                regenerate_batch_size: 10,
                delay: Duration::from_millis(600),
            },
        );

        let started = tokio::time::Instant::now();
        indexer.generate(STORE).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_spaces_calls_across_passes() {
        let backend = Arc::new(MemoryBackend::new());
        for id in ["a", "b", "c"] {
            backend.upsert_product(product(id, "Mug")).await.unwrap();
        }
        let embedder = Arc::new(CountingEmbedder::new());
        let indexer = EmbeddingIndexer::new(
            backend,
            embedder.clone(),
            IndexerConfig {
                batch_size: 1,
                regenerate_batch_size: 1,
                delay: Duration::from_millis(600),
            },
        );

        let started = tokio::time::Instant::now();
        let report = indexer.regenerate_all(STORE).await.unwrap();
        assert_eq!(report.total_embedded, 3);
        assert_eq!(report.passes, 4);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1200));
    }
}
