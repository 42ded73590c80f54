//! The retrieval engine behind the `searchProducts` tool.

use crate::embeddings::EmbeddingClient;
use crate::error::CatalogError;
use crate::price::PriceRange;
use crate::search::{extract_product_names, keyword_search, name_search, semantic_search};
use crate::Result;
use serde::{Deserialize, Serialize};
use shopassist_core::{CatalogRepository, Product};
use std::collections::HashSet;
use std::sync::Arc;

/// Upper bound on `maxResults`, whatever the model asks for.
pub const MAX_RESULTS_CAP: usize = 25;

/// Which matcher to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Keyword,
    Semantic,
    ExactNames,
}

/// Tool input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,

    #[serde(default)]
    pub search_type: SearchType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,

    pub store_id: String,
}

/// A product as presented to the language model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// `$40.00`, or `$40.00 - $60.00` for a range.
    pub price: String,
    pub price_min: f64,
    pub price_max: f64,
    pub in_stock: bool,
    pub stock_level: i64,
    pub image_url: Option<String>,
    pub handle: String,
    pub tags: Vec<String>,
    pub product_type: Option<String>,
    pub vendor: Option<String>,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.clone(),
            title: p.title.clone(),
            description: p.description.clone(),
            price: format_price(p.price_min, p.price_max),
            price_min: p.price_min,
            price_max: p.price_max,
            in_stock: p.available_for_sale && p.total_inventory > 0,
            stock_level: p.total_inventory,
            image_url: p.image_url.clone(),
            handle: p.handle.clone(),
            tags: p.tags.iter().cloned().collect(),
            product_type: p.product_type.clone(),
            vendor: p.vendor.clone(),
        }
    }
}

/// Human-readable price: a single value, or a range when min and max differ.
pub fn format_price(min: f64, max: f64) -> String {
    if (min - max).abs() < f64::EPSILON {
        format!("${:.2}", min)
    } else {
        format!("${:.2} - ${:.2}", min, max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub search_type: SearchType,
    pub query: String,
    pub price_constraints: PriceRange,
}

/// Tool output. Always well-formed, even when the search failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub success: bool,
    pub products_found: usize,
    pub products: Vec<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_metadata: Option<SearchMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            products_found: 0,
            products: Vec::new(),
            search_metadata: None,
            error: Some(error.into()),
        }
    }
}

/// Dispatches to a matcher, applies price constraints and formats results.
pub struct RetrievalEngine {
    catalog: Arc<dyn CatalogRepository>,
    embeddings: Arc<dyn EmbeddingClient>,
    default_max_results: usize,
}

impl RetrievalEngine {
    pub fn new(catalog: Arc<dyn CatalogRepository>, embeddings: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            catalog,
            embeddings,
            default_max_results: 5,
        }
    }

    /// Result cap used when a request omits `maxResults`.
    pub fn with_default_max_results(mut self, n: usize) -> Self {
        self.default_max_results = n.max(1);
        self
    }

    /// Run a search. Failures are reported inside the outcome, never returned.
    pub async fn search(&self, request: &SearchRequest) -> SearchOutcome {
        let price = PriceRange::parse(&request.query);

        match self.find(request, &price).await {
            Ok(products) => {
                tracing::debug!(
                    store_id = %request.store_id,
                    search_type = ?request.search_type,
                    found = products.len(),
                    "Product search finished"
                );
                SearchOutcome {
                    success: true,
                    products_found: products.len(),
                    products: products.iter().map(ProductSummary::from).collect(),
                    search_metadata: Some(SearchMetadata {
                        search_type: request.search_type,
                        query: request.query.clone(),
                        price_constraints: price,
                    }),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    store_id = %request.store_id,
                    search_type = ?request.search_type,
                    error = %e,
                    "Product search failed"
                );
                SearchOutcome::failure(e.to_string())
            }
        }
    }

    /// Matching products after price filtering, best first.
    pub async fn find(&self, request: &SearchRequest, price: &PriceRange) -> Result<Vec<Product>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(CatalogError::validation("query must not be empty"));
        }
        if request.store_id.trim().is_empty() {
            return Err(CatalogError::validation("storeId must not be empty"));
        }

        let limit = request
            .max_results
            .unwrap_or(self.default_max_results)
            .clamp(1, MAX_RESULTS_CAP);
        let filtering = !price.is_empty() && !price.is_inverted();
        // With a price filter the cap applies after filtering, so fetch every candidate.
        let candidates = if filtering { usize::MAX } else { limit };

        let catalog = self.catalog.as_ref();
        let mut products = match request.search_type {
            SearchType::Keyword => {
                keyword_search(catalog, &request.store_id, query, candidates).await?
            }
            SearchType::Semantic => {
                let vector = self.embeddings.embed(query).await?;
                semantic_search(
                    catalog,
                    &request.store_id,
                    &vector,
                    &HashSet::new(),
                    candidates,
                )
                .await?
                .into_iter()
                .map(|(product, _)| product)
                .collect()
            }
            SearchType::ExactNames => {
                let mut names = extract_product_names(query);
                if names.is_empty() {
                    names.push(query.trim_matches('"').to_string());
                }
                name_search(catalog, &request.store_id, &names, candidates).await?
            }
        };

        if filtering {
            products.retain(|p| price.contains(p.price_min));
        }
        products.truncate(limit);
        Ok(products)
    }
}
