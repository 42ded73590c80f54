//! Streaming chat endpoint.

use super::{header_safe, ShopQuery};
use crate::error::GatewayError;
use crate::server::{GatewayState, SESSION_HEADER};
use crate::Result;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::{future, stream, StreamExt};
use serde_json::Value;
use shopassist_agent::{ChatEvent, RequestContext};
use std::sync::Arc;
use tracing::warn;

/// The parts of a chat request body the gateway reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Value>,
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Parse a body of the form `{"messages": [...], "sessionId"?: "..."}`.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        let messages = value
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::validation("Messages must be an array"))?
            .clone();
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            messages,
            session_id,
        })
    }

    /// Text of the most recent user message.
    pub fn last_user_message(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .find_map(message_text)
    }
}

/// Plain string content, or the concatenated text parts.
fn message_text(message: &Value) -> Option<String> {
    let text = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => join_text_parts(parts),
        _ => join_text_parts(message.get("parts").and_then(Value::as_array)?),
    };

    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn join_text_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect()
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let shop = query.require_shop()?;
    let request = ChatRequest::parse(&body)?;
    let message = request
        .last_user_message()
        .ok_or_else(|| GatewayError::validation("No user message to answer"))?;

    let context = RequestContext {
        shop: Some(shop),
        is_admin: state.is_admin(&headers)?,
        customer_id: query.customer_id(),
        client_session_id: header_safe(request.session_id.or(query.session_id)),
    };

    let prepared = state.orchestrator.prepare(&context, &message).await?;
    let session_id = HeaderValue::from_str(&prepared.session.session_id)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    let mut events = state.orchestrator.stream(prepared);

    // Failures before the first chunk still get a proper status code.
    let mut first = None;
    while let Some(event) = events.next().await {
        match event? {
            ChatEvent::Delta { text } => {
                first = Some(text);
                break;
            }
            ChatEvent::ToolCall { .. } => {}
            ChatEvent::Finished { .. } => break,
        }
    }

    let chunks = stream::iter(first.map(|text| Ok::<_, std::io::Error>(Bytes::from(text)))).chain(
        events.filter_map(|event| {
            future::ready(match event {
                Ok(ChatEvent::Delta { text }) => Some(Ok(Bytes::from(text))),
                Ok(_) => None,
                Err(e) => {
                    warn!("Chat stream aborted: {}", e);
                    Some(Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        e.to_string(),
                    )))
                }
            })
        }),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(SESSION_HEADER, session_id)
        .body(Body::from_stream(chunks))
        .map_err(|e| GatewayError::Internal(e.to_string()))
}
