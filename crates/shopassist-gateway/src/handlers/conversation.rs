//! Conversation history endpoint.

use super::{header_safe, ShopQuery};
use crate::server::GatewayState;
use crate::Result;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use shopassist_agent::RequestContext;
use shopassist_core::{ChatMessage, SessionType};
use std::sync::Arc;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
}

/// `GET /api/conversation`
///
/// Never mints an anonymous id: a caller with nothing to resolve gets an
/// empty history.
pub async fn history(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>> {
    let context = RequestContext {
        shop: Some(query.require_shop()?),
        is_admin: state.is_admin(&headers)?,
        customer_id: query.customer_id(),
        client_session_id: header_safe(query.session_id),
    };

    let Some(session) = context.resolve_existing()? else {
        return Ok(Json(HistoryResponse::default()));
    };

    let messages = state
        .orchestrator
        .conversations()
        .history(&session.session_id, &session.store_id)
        .await?
        .map(|thread| thread.messages)
        .unwrap_or_default();

    Ok(Json(HistoryResponse {
        messages,
        session_id: Some(session.session_id),
        session_type: Some(session.session_type),
    }))
}
