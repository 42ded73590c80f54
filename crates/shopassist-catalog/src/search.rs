//! Catalog matchers.
//!
//! Each matcher reads one store's products through the catalog repository
//! and returns them ranked, capped at `limit`.

use crate::embeddings::euclidean_distance;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use shopassist_core::{CatalogRepository, Product, ProductScope};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid quoted regex"));

static CAPITALIZED_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").expect("valid phrase regex")
});

static MODEL_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2,}-?[A-Z0-9]+\b").expect("valid model regex"));

/// Query words used for tag matching: whitespace-split, longer than two
/// characters, lower-cased.
pub fn query_tokens(query: &str) -> BTreeSet<String> {
    query
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Case-insensitive substring match on the text fields, or any tag equal to
/// a query token.
pub fn keyword_matches(product: &Product, needle: &str, tokens: &BTreeSet<String>) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);

    contains(&product.title)
        || product.description.as_deref().map_or(false, contains)
        || product.product_type.as_deref().map_or(false, contains)
        || product.vendor.as_deref().map_or(false, contains)
        || product
            .tags
            .iter()
            .any(|tag| tokens.contains(&tag.to_lowercase()))
}

/// Well-stocked first, then cheaper.
fn by_stock_then_price(a: &Product, b: &Product) -> Ordering {
    b.total_inventory
        .cmp(&a.total_inventory)
        .then_with(|| a.price_min.partial_cmp(&b.price_min).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

/// In-stock products matching the query text or its tokens.
pub async fn keyword_search(
    catalog: &dyn CatalogRepository,
    store_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Product>> {
    let needle = query.trim().to_lowercase();
    let tokens = query_tokens(query);

    let mut matches: Vec<Product> = catalog
        .scan_products(store_id, ProductScope::InStock)
        .await?
        .into_iter()
        .filter(|p| keyword_matches(p, &needle, &tokens))
        .collect();

    matches.sort_by(by_stock_then_price);
    matches.truncate(limit);
    Ok(matches)
}

/// In-stock embedded products nearest to `vector`, with their distances.
///
/// Products in `exclude`, or whose stored vector has a different length,
/// are skipped before ranking.
pub async fn semantic_search(
    catalog: &dyn CatalogRepository,
    store_id: &str,
    vector: &[f32],
    exclude: &HashSet<String>,
    limit: usize,
) -> Result<Vec<(Product, f32)>> {
    let mut scored: Vec<(Product, f32)> = catalog
        .scan_products(store_id, ProductScope::Embedded)
        .await?
        .into_iter()
        .filter(|p| !exclude.contains(&p.id))
        .filter_map(|p| {
            let distance = p
                .embedding
                .as_ref()
                .and_then(|e| euclidean_distance(vector, &e.vector))?;
            Some((p, distance))
        })
        .collect();

    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored.truncate(limit);
    Ok(scored)
}

/// Active products whose title contains one of `names`, or whose tags
/// include a lower-cased name. Stock is not required.
pub async fn name_search(
    catalog: &dyn CatalogRepository,
    store_id: &str,
    names: &[String],
    limit: usize,
) -> Result<Vec<Product>> {
    let names: Vec<String> = names
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let mut matches: Vec<Product> = catalog
        .scan_products(store_id, ProductScope::Active)
        .await?
        .into_iter()
        .filter(|p| {
            let title = p.title.to_lowercase();
            names.iter().any(|name| {
                title.contains(name.as_str()) || p.tags.iter().any(|t| t.to_lowercase() == *name)
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.total_inventory
            .cmp(&a.total_inventory)
            .then_with(|| a.title.cmp(&b.title))
    });
    matches.truncate(limit);
    Ok(matches)
}

/// Candidate product names in a query: quoted substrings, capitalized
/// multi-word phrases and model-number-like tokens, first occurrence wins.
pub fn extract_product_names(query: &str) -> Vec<String> {
    let quoted = QUOTED
        .captures_iter(query)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());
    let phrases = CAPITALIZED_PHRASE
        .find_iter(query)
        .map(|m| m.as_str().to_string());
    let models = MODEL_NUMBER.find_iter(query).map(|m| m.as_str().to_string());

    let mut seen = HashSet::new();
    quoted
        .chain(phrases)
        .chain(models)
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}
