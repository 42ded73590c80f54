//! CLI command implementations.

pub mod catalog;
pub mod config;
pub mod embeddings;
pub mod serve;

use anyhow::Context;
use shopassist_catalog::{EmbeddingClient, EmbeddingIndexer, IndexerConfig, OpenAIEmbeddings};
use shopassist_core::Config;
use shopassist_storage::Storage;
use std::sync::Arc;

/// Build the embedding client. A missing API key surfaces on first use.
pub(crate) fn embedding_client(config: &Config) -> anyhow::Result<Arc<dyn EmbeddingClient>> {
    let client = OpenAIEmbeddings::from_config(&config.openai, &config.embeddings)
        .context("Failed to create embedding client")?;
    Ok(Arc::new(client))
}

pub(crate) fn indexer(
    config: &Config,
    storage: &Storage,
    embeddings: Arc<dyn EmbeddingClient>,
) -> EmbeddingIndexer {
    EmbeddingIndexer::new(
        storage.catalog.clone(),
        embeddings,
        IndexerConfig::from(&config.embeddings),
    )
}

/// Open storage, run `f`, and close storage whatever the outcome.
pub(crate) async fn with_storage<T, F, Fut>(config: &Config, f: F) -> anyhow::Result<T>
where
    F: FnOnce(Storage) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let storage = Storage::open(config)
        .await
        .context("Failed to open storage")?;
    let result = f(storage.clone()).await;
    storage.close().await;
    result
}
