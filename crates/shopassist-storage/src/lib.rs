//! Repository backends for ShopAssist.
//!
//! Two implementations of the core repository traits:
//!
//! - [`MemoryBackend`]: lock-guarded maps, used by tests and `database.url = "memory"`
//! - [`SqliteBackend`]: a sqlx pool over a single SQLite file
//!
//! [`Storage`] bundles the three repository handles and owns the backend's
//! lifecycle: open it once at start-up, hand the `Arc`s out, close it on
//! shutdown.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use shopassist_core::{
    CatalogRepository, Config, ConversationRepository, StorageResult, StoreRepository,
};
use std::sync::Arc;

/// Repository handles backed by one storage engine.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub stores: Arc<dyn StoreRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    sqlite: Option<SqliteBackend>,
}

impl Storage {
    /// Open the backend selected by `database.url`.
    pub async fn open(config: &Config) -> StorageResult<Self> {
        match config.database_path() {
            None => {
                tracing::info!("Using in-memory storage");
                Ok(Self::in_memory())
            }
            Some(path) => {
                let backend = SqliteBackend::open(&path, config.database.max_connections).await?;
                Ok(Self::from_sqlite(backend))
            }
        }
    }

    /// A fresh, empty in-memory store.
    pub fn in_memory() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        Self {
            catalog: backend.clone(),
            stores: backend.clone(),
            conversations: backend,
            sqlite: None,
        }
    }

    pub fn from_sqlite(backend: SqliteBackend) -> Self {
        let shared = Arc::new(backend.clone());
        Self {
            catalog: shared.clone(),
            stores: shared.clone(),
            conversations: shared,
            sqlite: Some(backend),
        }
    }

    /// Release pooled connections. Safe to call more than once.
    pub async fn close(&self) {
        if let Some(sqlite) = &self.sqlite {
            sqlite.close().await;
        }
    }
}
