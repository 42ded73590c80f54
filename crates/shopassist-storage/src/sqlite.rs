//! SQLite repository backend.
//!
//! ## Schema
//!
//! ```sql
//! stores        (domain PK, name, ai_config JSON, is_active, created_at, updated_at)
//! products      (store_id, id, ..., embedding BLOB, embedding_model, last_embedded,
//!                search_metadata JSON, sync_version, updated_at, PK (store_id, id))
//! conversations (id PK, store_id, session_id, session_type, customer_id,
//!                created_at, last_message_at, UNIQUE (store_id, session_id))
//! messages      (id PK, conversation_id FK, role, content, created_at)
//! ```
//!
//! Timestamps are RFC 3339 text with fixed microsecond precision so they sort
//! lexically. Embeddings are little-endian `f32` BLOBs.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use shopassist_core::repository::NewConversation;
use shopassist_core::{
    AiConfig, CatalogRepository, CatalogStatus, ChatMessage, Conversation,
    ConversationRepository, Product, ProductEmbedding, ProductScope, ProductStatus, Role,
    StorageError, StorageResult, Store, StoreRepository,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS stores (
        domain TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        ai_config TEXT NOT NULL DEFAULT '{}',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS products (
        store_id TEXT NOT NULL,
        id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        handle TEXT NOT NULL,
        product_type TEXT,
        vendor TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        price_min REAL NOT NULL,
        price_max REAL NOT NULL,
        available_for_sale INTEGER NOT NULL,
        status TEXT NOT NULL,
        total_inventory INTEGER NOT NULL,
        image_url TEXT,
        image_urls TEXT NOT NULL DEFAULT '[]',
        embedding BLOB,
        embedding_model TEXT,
        last_embedded TEXT,
        search_metadata TEXT,
        sync_version INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (store_id, id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_products_store_status ON products(store_id, status)",
    r#"CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        store_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        session_type TEXT NOT NULL,
        customer_id TEXT,
        created_at TEXT NOT NULL,
        last_message_at TEXT,
        UNIQUE (store_id, session_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at)",
];

const PRODUCT_COLUMNS: &str = "store_id, id, title, description, handle, product_type, vendor, \
     tags, price_min, price_max, available_for_sale, status, total_inventory, image_url, \
     image_urls, embedding, embedding_model, last_embedded, search_metadata, sync_version, \
     updated_at";

const IN_STOCK: &str = "status = 'active' AND available_for_sale = 1 AND total_inventory > 0";
const HAS_EMBEDDING: &str =
    "embedding IS NOT NULL AND length(embedding) > 0 AND embedding_model IS NOT NULL \
     AND last_embedded IS NOT NULL";

/// Repository backend over a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (creating if needed) the database file and apply the schema.
    pub async fn open(path: &Path, max_connections: u32) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::database(format!("{}: {}", parent.display(), e)))?;
            }
        }

        tracing::info!(path = %path.display(), "Opening SQLite database");

        let options = SqliteConnectOptions::new()
            .create_if_missing(true)
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(db)?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db)?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn select_store(&self, domain: &str) -> StorageResult<Option<Store>> {
        let row = sqlx::query(
            "SELECT domain, name, ai_config, is_active, created_at, updated_at \
             FROM stores WHERE domain = ?",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(row_to_store).transpose()
    }
}

fn db(e: sqlx::Error) -> StorageError {
    StorageError::database(e.to_string())
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> StorageResult<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(StorageError::Corrupt(format!(
            "embedding blob of {} bytes is not a whole number of f32s",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn scope_clause(scope: ProductScope) -> String {
    match scope {
        ProductScope::All => String::new(),
        ProductScope::Active => " AND status = 'active'".to_string(),
        ProductScope::InStock => format!(" AND {}", IN_STOCK),
        ProductScope::Embedded => format!(" AND {} AND {}", IN_STOCK, HAS_EMBEDDING),
    }
}

fn row_to_store(row: &SqliteRow) -> StorageResult<Store> {
    let ai_config: String = row.try_get("ai_config").map_err(db)?;
    let created_at: String = row.try_get("created_at").map_err(db)?;
    let updated_at: String = row.try_get("updated_at").map_err(db)?;

    Ok(Store {
        domain: row.try_get("domain").map_err(db)?,
        name: row.try_get("name").map_err(db)?,
        ai_config: serde_json::from_str(&ai_config)
            .map_err(|e| StorageError::Corrupt(format!("ai_config: {}", e)))?,
        is_active: row.try_get("is_active").map_err(db)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn row_to_product(row: &SqliteRow) -> StorageResult<Product> {
    let tags: String = row.try_get("tags").map_err(db)?;
    let image_urls: String = row.try_get("image_urls").map_err(db)?;
    let status: String = row.try_get("status").map_err(db)?;
    let updated_at: String = row.try_get("updated_at").map_err(db)?;

    let blob: Option<Vec<u8>> = row.try_get("embedding").map_err(db)?;
    let model: Option<String> = row.try_get("embedding_model").map_err(db)?;
    let embedded_at: Option<String> = row.try_get("last_embedded").map_err(db)?;
    let metadata: Option<String> = row.try_get("search_metadata").map_err(db)?;

    // All three embedding columns are written together; anything else is unembedded.
    let embedding = match (blob, model, embedded_at) {
        (Some(blob), Some(model), Some(at)) if !blob.is_empty() => Some(ProductEmbedding {
            vector: blob_to_vector(&blob)?,
            model,
            embedded_at: parse_ts(&at)?,
            metadata: metadata
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| StorageError::Corrupt(format!("search_metadata: {}", e)))?
                .unwrap_or(serde_json::Value::Null),
        }),
        _ => None,
    };

    Ok(Product {
        id: row.try_get("id").map_err(db)?,
        store_id: row.try_get("store_id").map_err(db)?,
        title: row.try_get("title").map_err(db)?,
        description: row.try_get("description").map_err(db)?,
        handle: row.try_get("handle").map_err(db)?,
        product_type: row.try_get("product_type").map_err(db)?,
        vendor: row.try_get("vendor").map_err(db)?,
        tags: serde_json::from_str::<BTreeSet<String>>(&tags)
            .map_err(|e| StorageError::Corrupt(format!("tags: {}", e)))?,
        price_min: row.try_get("price_min").map_err(db)?,
        price_max: row.try_get("price_max").map_err(db)?,
        available_for_sale: row.try_get("available_for_sale").map_err(db)?,
        status: status.parse::<ProductStatus>().map_err(StorageError::Corrupt)?,
        total_inventory: row.try_get("total_inventory").map_err(db)?,
        image_url: row.try_get("image_url").map_err(db)?,
        image_urls: serde_json::from_str(&image_urls)
            .map_err(|e| StorageError::Corrupt(format!("image_urls: {}", e)))?,
        embedding,
        sync_version: row.try_get("sync_version").map_err(db)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn row_to_conversation(row: &SqliteRow) -> StorageResult<Conversation> {
    let session_type: String = row.try_get("session_type").map_err(db)?;
    let created_at: String = row.try_get("created_at").map_err(db)?;
    let last_message_at: Option<String> = row.try_get("last_message_at").map_err(db)?;

    Ok(Conversation {
        id: row.try_get("id").map_err(db)?,
        store_id: row.try_get("store_id").map_err(db)?,
        session_id: row.try_get("session_id").map_err(db)?,
        session_type: session_type.parse().map_err(StorageError::Corrupt)?,
        customer_id: row.try_get("customer_id").map_err(db)?,
        created_at: parse_ts(&created_at)?,
        last_message_at: last_message_at.as_deref().map(parse_ts).transpose()?,
    })
}

fn row_to_message(row: &SqliteRow) -> StorageResult<ChatMessage> {
    let role: String = row.try_get("role").map_err(db)?;
    let created_at: String = row.try_get("created_at").map_err(db)?;

    Ok(ChatMessage {
        id: row.try_get("id").map_err(db)?,
        conversation_id: row.try_get("conversation_id").map_err(db)?,
        role: role.parse::<Role>().map_err(StorageError::Corrupt)?,
        content: row.try_get("content").map_err(db)?,
        created_at: parse_ts(&created_at)?,
    })
}

fn json_text<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::database(e.to_string()))
}

#[async_trait]
impl CatalogRepository for SqliteBackend {
    async fn upsert_product(&self, mut product: Product) -> StorageResult<Product> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM products WHERE store_id = ? AND id = ?",
            PRODUCT_COLUMNS
        ))
        .bind(&product.store_id)
        .bind(&product.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db)?;

        match existing.as_ref().map(row_to_product).transpose()? {
            Some(existing) => {
                product.sync_version = existing.sync_version.max(product.sync_version) + 1;
                product.embedding = if product.embedding_input_changed(&existing) {
                    None
                } else {
                    existing.embedding
                };
            }
            None => {
                product.sync_version = product.sync_version.max(0) + 1;
                product.embedding = None;
            }
        }
        product.updated_at = Utc::now();

        let (blob, model, embedded_at, metadata) = match &product.embedding {
            Some(e) => (
                Some(vector_to_blob(&e.vector)),
                Some(e.model.clone()),
                Some(ts(e.embedded_at)),
                Some(json_text(&e.metadata)?),
            ),
            None => (None, None, None, None),
        };

        sqlx::query(&format!(
            "INSERT OR REPLACE INTO products ({}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PRODUCT_COLUMNS
        ))
        .bind(&product.store_id)
        .bind(&product.id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.handle)
        .bind(&product.product_type)
        .bind(&product.vendor)
        .bind(json_text(&product.tags)?)
        .bind(product.price_min)
        .bind(product.price_max)
        .bind(product.available_for_sale)
        .bind(product.status.as_str())
        .bind(product.total_inventory)
        .bind(&product.image_url)
        .bind(json_text(&product.image_urls)?)
        .bind(blob)
        .bind(model)
        .bind(embedded_at)
        .bind(metadata)
        .bind(product.sync_version)
        .bind(ts(product.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(product)
    }

    async fn get_product(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> StorageResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM products WHERE store_id = ? AND id = ?",
            PRODUCT_COLUMNS
        ))
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn scan_products(
        &self,
        store_id: &str,
        scope: ProductScope,
    ) -> StorageResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products WHERE store_id = ?{}",
            PRODUCT_COLUMNS,
            scope_clause(scope)
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(row_to_product).collect()
    }

    async fn products_needing_embedding(
        &self,
        store_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products \
             WHERE store_id = ? AND status = 'active' AND available_for_sale = 1 \
             AND NOT ({}) \
             ORDER BY updated_at, id LIMIT ?",
            PRODUCT_COLUMNS, HAS_EMBEDDING
        ))
        .bind(store_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(row_to_product).collect()
    }

    async fn save_embedding(
        &self,
        store_id: &str,
        product_id: &str,
        embedding: ProductEmbedding,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE products SET embedding = ?, embedding_model = ?, last_embedded = ?, \
             search_metadata = ? WHERE store_id = ? AND id = ?",
        )
        .bind(vector_to_blob(&embedding.vector))
        .bind(&embedding.model)
        .bind(ts(embedding.embedded_at))
        .bind(json_text(&embedding.metadata)?)
        .bind(store_id)
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Product", product_id));
        }
        Ok(())
    }

    async fn clear_embeddings(&self, store_id: &str) -> StorageResult<u64> {
        let result = sqlx::query(
            "UPDATE products SET embedding = NULL, embedding_model = NULL, \
             last_embedded = NULL, search_metadata = NULL \
             WHERE store_id = ? AND embedding IS NOT NULL",
        )
        .bind(store_id)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(result.rows_affected())
    }

    async fn catalog_status(&self, store_id: &str) -> StorageResult<CatalogStatus> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total, \
             COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0) AS active, \
             COALESCE(SUM(CASE WHEN {in_stock} THEN 1 ELSE 0 END), 0) AS in_stock, \
             COALESCE(SUM(CASE WHEN {embedded} THEN 1 ELSE 0 END), 0) AS embedded, \
             COALESCE(SUM(CASE WHEN status = 'active' AND available_for_sale = 1 \
                 AND NOT ({embedded}) THEN 1 ELSE 0 END), 0) AS pending \
             FROM products WHERE store_id = ?",
            in_stock = IN_STOCK,
            embedded = HAS_EMBEDDING,
        ))
        .bind(store_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        let count = |col: &str| -> StorageResult<u64> {
            let n: i64 = row.try_get(col).map_err(db)?;
            Ok(n.max(0) as u64)
        };

        Ok(CatalogStatus {
            total: count("total")?,
            active: count("active")?,
            in_stock: count("in_stock")?,
            embedded: count("embedded")?,
            pending: count("pending")?,
        })
    }
}

#[async_trait]
impl StoreRepository for SqliteBackend {
    async fn find_store(&self, domain: &str) -> StorageResult<Option<Store>> {
        self.select_store(domain).await
    }

    async fn ensure_store(&self, domain: &str) -> StorageResult<Store> {
        let store = Store::minimal(domain);
        sqlx::query(
            "INSERT INTO stores (domain, name, ai_config, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT(domain) DO NOTHING",
        )
        .bind(&store.domain)
        .bind(&store.name)
        .bind(json_text(&store.ai_config)?)
        .bind(store.is_active)
        .bind(ts(store.created_at))
        .bind(ts(store.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        self.select_store(domain)
            .await?
            .ok_or_else(|| StorageError::not_found("Store", domain))
    }

    async fn update_ai_config(&self, domain: &str, ai_config: AiConfig) -> StorageResult<Store> {
        let result = sqlx::query("UPDATE stores SET ai_config = ?, updated_at = ? WHERE domain = ?")
            .bind(json_text(&ai_config)?)
            .bind(ts(Utc::now()))
            .bind(domain)
            .execute(&self.pool)
            .await
            .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Store", domain));
        }
        self.select_store(domain)
            .await?
            .ok_or_else(|| StorageError::not_found("Store", domain))
    }
}

#[async_trait]
impl ConversationRepository for SqliteBackend {
    async fn find_conversation(
        &self,
        store_id: &str,
        session_id: &str,
    ) -> StorageResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, store_id, session_id, session_type, customer_id, created_at, \
             last_message_at FROM conversations WHERE store_id = ? AND session_id = ?",
        )
        .bind(store_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn create_conversation(&self, new: NewConversation) -> StorageResult<Conversation> {
        // A concurrent create for the same pair loses the insert and reads the winner.
        sqlx::query(
            "INSERT INTO conversations (id, store_id, session_id, session_type, customer_id, \
             created_at) VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT(store_id, session_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&new.store_id)
        .bind(&new.session_id)
        .bind(new.session_type.as_str())
        .bind(&new.customer_id)
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        self.find_conversation(&new.store_id, &new.session_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Conversation", new.session_id))
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> StorageResult<ChatMessage> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db)?;

        let touched = sqlx::query("UPDATE conversations SET last_message_at = ? WHERE id = ?")
            .bind(ts(now))
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        if touched.rows_affected() == 0 {
            return Err(StorageError::not_found("Conversation", conversation_id));
        }

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        };
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(ts(message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(message)
    }

    async fn messages(&self, conversation_id: &str) -> StorageResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, created_at FROM messages \
             WHERE conversation_id = ? ORDER BY created_at, rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(row_to_message).collect()
    }
}
