//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A product mirrored from the commerce platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Platform product id.
    pub id: String,

    /// Owning store domain.
    pub store_id: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// URL handle.
    #[serde(default)]
    pub handle: String,

    #[serde(default)]
    pub product_type: Option<String>,

    #[serde(default)]
    pub vendor: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    pub price_min: f64,
    pub price_max: f64,

    #[serde(default)]
    pub available_for_sale: bool,

    #[serde(default)]
    pub status: ProductStatus,

    #[serde(default)]
    pub total_inventory: i64,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub image_urls: Vec<String>,

    /// Present only when vector, model and timestamp were written together.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<ProductEmbedding>,

    /// Incremented by every upsert from the sync collaborator.
    #[serde(default)]
    pub sync_version: i64,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Active, saleable and with stock on hand.
    pub fn is_in_stock(&self) -> bool {
        self.is_active() && self.available_for_sale && self.total_inventory > 0
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// True when a non-empty embedding vector is stored.
    pub fn has_embedding(&self) -> bool {
        self.embedding
            .as_ref()
            .map_or(false, |e| !e.vector.is_empty())
    }

    /// Whether the fields that feed the embedding text differ from `other`.
    pub fn embedding_input_changed(&self, other: &Product) -> bool {
        self.title != other.title
            || self.description != other.description
            || self.product_type != other.product_type
            || self.vendor != other.vendor
            || self.tags != other.tags
            || self.price_min != other.price_min
            || self.price_max != other.price_max
    }
}

/// Product publication status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Draft,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "draft" => Ok(Self::Draft),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown product status: {}", other)),
        }
    }
}

/// A stored embedding and its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductEmbedding {
    pub vector: Vec<f32>,

    /// Model that produced the vector.
    pub model: String,

    pub embedded_at: DateTime<Utc>,

    /// Echo of the input text and vector length.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Which products a catalog scan returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductScope {
    /// Every product in the store.
    All,
    /// Active products regardless of stock.
    Active,
    /// Active, saleable products with inventory.
    InStock,
    /// In-stock products that carry an embedding.
    Embedded,
}

impl ProductScope {
    pub fn includes(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Active => product.is_active(),
            Self::InStock => product.is_in_stock(),
            Self::Embedded => product.is_in_stock() && product.has_embedding(),
        }
    }
}

/// Per-store catalog counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    pub total: u64,
    pub active: u64,
    pub in_stock: u64,
    pub embedded: u64,
    /// Active, saleable products still waiting for an embedding.
    pub pending: u64,
}

/// Whether the embedding job should pick up this product.
pub fn needs_embedding(product: &Product) -> bool {
    product.is_active() && product.available_for_sale && !product.has_embedding()
}
