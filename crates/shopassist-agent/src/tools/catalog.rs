//! The `searchProducts` tool.

use super::{Tool, ToolContext, ToolResult};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use shopassist_catalog::{
    RetrievalEngine, SearchOutcome, SearchRequest, SearchType, MAX_RESULTS_CAP,
};
use shopassist_providers::ToolDefinition;
use std::sync::Arc;
use tracing::{info, warn};

pub const SEARCH_PRODUCTS: &str = "searchProducts";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    #[serde(default)]
    search_type: SearchType,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    store_id: Option<String>,
}

/// Exposes the retrieval engine to the model.
///
/// Searches always run against the conversation's own store; a `storeId`
/// argument naming another store is ignored.
pub struct SearchProductsTool {
    engine: Arc<RetrievalEngine>,
}

impl SearchProductsTool {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SearchProductsTool {
    fn name(&self) -> &str {
        SEARCH_PRODUCTS
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_PRODUCTS.to_string(),
            description: "Search for products in the store catalog by keywords, product names, \
                          or semantic similarity. Returns available products with pricing and \
                          stock information."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query - can be keywords, product names, or descriptions"
                    },
                    "searchType": {
                        "type": "string",
                        "enum": ["keyword", "semantic", "exact_names"],
                        "default": "keyword",
                        "description": "Type of search to perform"
                    },
                    "maxResults": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_RESULTS_CAP,
                        "default": 5,
                        "description": "Maximum number of products to return"
                    },
                    "storeId": {
                        "type": "string",
                        "description": "The store ID to search products in"
                    }
                },
                "required": ["query", "storeId"]
            }),
        }
    }

    async fn execute(
        &self,
        tool_use_id: &str,
        args: Value,
        context: &ToolContext,
    ) -> Result<ToolResult> {
        let args: SearchArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(e) => {
                let outcome = SearchOutcome::failure(format!("Invalid search arguments: {}", e));
                return Ok(ToolResult {
                    is_error: true,
                    ..ToolResult::success(tool_use_id, serde_json::to_value(&outcome)?)
                });
            }
        };

        if let Some(requested) = args.store_id.as_deref() {
            if requested != context.store_id {
                warn!(
                    requested,
                    store_id = %context.store_id,
                    "Ignoring storeId outside the conversation's store"
                );
            }
        }

        let request = SearchRequest {
            query: args.query,
            search_type: args.search_type,
            max_results: args.max_results,
            store_id: context.store_id.clone(),
        };
        let outcome = self.engine.search(&request).await;

        info!(
            tool = SEARCH_PRODUCTS,
            store_id = %context.store_id,
            session_id = %context.session_id,
            search_type = ?request.search_type,
            success = outcome.success,
            results = outcome.products_found,
            "Tool executed"
        );

        Ok(ToolResult {
            is_error: !outcome.success,
            ..ToolResult::success(tool_use_id, serde_json::to_value(&outcome)?)
        })
    }
}
