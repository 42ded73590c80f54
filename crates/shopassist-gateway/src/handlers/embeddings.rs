//! Store-owner triggers for the embedding maintenance job.

use super::ShopQuery;
use crate::server::GatewayState;
use crate::Result;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingAction {
    /// Embed one batch of pending products.
    #[default]
    Generate,
    /// Clear every embedding, then embed until nothing is pending.
    Regenerate,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingRequest {
    #[serde(default)]
    action: EmbeddingAction,
}

/// `POST /api/products/embeddings`
pub async fn run(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    state.require_admin(&headers)?;
    let shop = query.require_shop()?;
    let request: EmbeddingRequest = if body.is_empty() {
        EmbeddingRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    info!(store_id = %shop, action = ?request.action, "Embedding run requested");

    let mut response = match request.action {
        EmbeddingAction::Generate => {
            let report = state.indexer.generate(&shop).await?;
            json!({ "success": true, "action": "generate", "report": report })
        }
        EmbeddingAction::Regenerate => {
            let report = state.indexer.regenerate_all(&shop).await?;
            json!({ "success": true, "action": "regenerate", "report": report })
        }
    };

    response["status"] = serde_json::to_value(state.indexer.status(&shop).await?)?;
    Ok(Json(response))
}

/// `GET /api/products/embeddings`
pub async fn status(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    state.require_admin(&headers)?;
    let shop = query.require_shop()?;
    let status = state.indexer.status(&shop).await?;

    Ok(Json(json!({
        "success": true,
        "storeId": shop,
        "status": status,
    })))
}
