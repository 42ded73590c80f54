//! Store assistant settings.

use super::ShopQuery;
use crate::server::GatewayState;
use crate::Result;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};
use shopassist_core::AiConfig;
use std::sync::Arc;
use tracing::info;

/// `PUT /api/store/ai-config`
///
/// Replaces the whole configuration. Keys this service does not interpret
/// are stored as given.
pub async fn update_ai_config(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    state.require_admin(&headers)?;
    let shop = query.require_shop()?;
    let ai_config: AiConfig = serde_json::from_slice(&body)?;

    state.stores.ensure_store(&shop).await?;
    let store = state.stores.update_ai_config(&shop, ai_config).await?;
    info!(store_id = %shop, "Assistant configuration updated");

    Ok(Json(json!({ "success": true, "store": store })))
}
