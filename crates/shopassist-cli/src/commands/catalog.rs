//! Catalog commands.

use super::with_storage;
use anyhow::Context;
use clap::{Args, Subcommand};
use serde_json::Value;
use shopassist_core::{Config, Product};
use std::path::PathBuf;
use tracing::info;

/// Catalog command arguments.
#[derive(Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// Upsert products from a JSON array file
    Import {
        /// Store domain the products belong to
        #[arg(long)]
        store: String,

        /// Path to a JSON file containing an array of products
        #[arg(long)]
        file: PathBuf,
    },
}

/// Run the catalog command.
pub async fn run(args: CatalogArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        CatalogCommand::Import { store, file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let products = parse_products(&raw, &store)?;

            let imported = with_storage(config, |storage| async move {
                storage.stores.ensure_store(&store).await?;
                let mut count = 0usize;
                for product in products {
                    let id = product.id.clone();
                    storage
                        .catalog
                        .upsert_product(product)
                        .await
                        .with_context(|| format!("Failed to upsert product {}", id))?;
                    count += 1;
                }
                info!(store_id = %store, count, "Catalog import finished");
                Ok(count)
            })
            .await?;

            println!("Imported {} products", imported);
            Ok(())
        }
    }
}

/// Parse a JSON array of products, assigning each to `store`.
fn parse_products(raw: &str, store: &str) -> anyhow::Result<Vec<Product>> {
    let value: Value = serde_json::from_str(raw).context("Catalog file is not valid JSON")?;
    let Value::Array(items) = value else {
        anyhow::bail!("Catalog file must contain a JSON array of products");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            let object = item
                .as_object_mut()
                .with_context(|| format!("Product #{} is not an object", i))?;
            object.insert("storeId".to_string(), Value::String(store.to_string()));
            serde_json::from_value(item).with_context(|| format!("Product #{} is invalid", i))
        })
        .collect()
}
