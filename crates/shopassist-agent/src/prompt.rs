//! System prompt assembly.

use crate::tools::SEARCH_PRODUCTS;
use crate::Result;
use shopassist_core::config::AssistantConfig;
use shopassist_core::{
    CatalogRepository, Personality, Product, ProductScope, Store, StoreRepository,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// What the prompt needs to know about a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub store: Store,
    /// Example product titles, best-stocked first.
    pub product_titles: Vec<String>,
    /// Distinct product types, most common first.
    pub categories: Vec<String>,
}

/// Builds the per-store system prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    assistant_name: String,
    sample_products: usize,
    sample_categories: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from(&AssistantConfig::default())
    }
}

impl From<&AssistantConfig> for PromptBuilder {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            assistant_name: config.name.clone(),
            sample_products: config.sample_products,
            sample_categories: config.sample_categories,
        }
    }
}

impl PromptBuilder {
    /// Read the store record and sample its catalog.
    pub async fn snapshot(
        &self,
        stores: &dyn StoreRepository,
        catalog: &dyn CatalogRepository,
        store_id: &str,
    ) -> Result<StoreSnapshot> {
        let store = stores
            .find_store(store_id)
            .await?
            .unwrap_or_else(|| Store::minimal(store_id));

        let mut products = catalog.scan_products(store_id, ProductScope::Active).await?;
        products.sort_by(|a, b| {
            b.is_in_stock()
                .cmp(&a.is_in_stock())
                .then_with(|| b.total_inventory.cmp(&a.total_inventory))
                .then_with(|| a.title.cmp(&b.title))
        });

        let mut seen = BTreeSet::new();
        let product_titles = products
            .iter()
            .map(|p| p.title.trim())
            .filter(|t| !t.is_empty() && seen.insert(t.to_string()))
            .take(self.sample_products)
            .map(str::to_string)
            .collect();

        Ok(StoreSnapshot {
            store,
            product_titles,
            categories: top_categories(&products, self.sample_categories),
        })
    }

    /// Render the system prompt.
    pub fn build(&self, snapshot: &StoreSnapshot) -> String {
        let store = &snapshot.store;
        let config = &store.ai_config;
        let mut prompt = String::new();

        let _ = writeln!(
            prompt,
            "You are {}, an AI shopping assistant for the store \"{}\".",
            self.assistant_name, store.name
        );
        prompt.push_str(personality_line(config.personality.unwrap_or_default()));
        prompt.push_str("\n\n");

        if !snapshot.product_titles.is_empty() {
            let _ = writeln!(
                prompt,
                "Products this store sells include: {}.",
                snapshot.product_titles.join(", ")
            );
        }
        if !snapshot.categories.is_empty() {
            let _ = writeln!(
                prompt,
                "Product categories: {}.",
                snapshot.categories.join(", ")
            );
        }
        if !snapshot.product_titles.is_empty() || !snapshot.categories.is_empty() {
            prompt.push('\n');
        }

        prompt.push_str("Rules:\n");
        let _ = writeln!(
            prompt,
            "- Before answering any question about products, availability or prices, call the \
             {} tool with storeId \"{}\".",
            SEARCH_PRODUCTS, store.domain
        );
        prompt.push_str(
            "- Use searchType \"exact_names\" when the shopper names a specific product, \
             \"semantic\" for descriptive requests, and \"keyword\" otherwise.\n\
             - Always present the products the tool returns (name, price, availability) instead \
             of asking clarifying questions first.\n\
             - Only mention products returned by the tool. If nothing matches, say so and \
             suggest a broader search.\n\
             - Keep responses concise and helpful.\n",
        );

        if let Some(custom) = non_blank(config.custom_instructions.as_deref()) {
            let _ = write!(prompt, "\nAdditional instructions: {}\n", custom);
        }
        if let Some(sales) = non_blank(config.instructions.as_deref()) {
            let _ = write!(prompt, "\nSales instructions from the merchant:\n{}\n", sales);
        }

        prompt
    }
}

fn personality_line(personality: Personality) -> &'static str {
    match personality {
        Personality::Professional => "Speak professionally and formally.",
        Personality::Casual => "Speak casually and relaxed.",
        Personality::Friendly => "Speak in a friendly and helpful manner.",
    }
}

fn top_categories(products: &[Product], limit: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for product_type in products
        .iter()
        .filter_map(|p| p.product_type.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        *counts.entry(product_type).or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(name, _)| name.to_string())
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
