//! HTTP surface, driven through the router without binding a socket.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use shopassist_core::{Role, StoreRepository};
use shopassist_integration_tests::{
    product, sqlite_storage, text_reply, Harness, Step, ADMIN_TOKEN, STORE,
};
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn chat_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_default();
    builder.body(body).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::in_memory(Vec::new()).await;
    let response = harness.router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_chat_rejects_malformed_requests() {
    let harness = Harness::in_memory(vec![text_reply(&["unused"])]).await;

    let response = harness
        .router()
        .oneshot(chat_request(
            "/api/chat",
            json!({ "messages": [{ "role": "user", "content": "hi" }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_request");
    assert_eq!(body["error"]["message"], "Missing shop parameter");

    let response = harness
        .router()
        .oneshot(chat_request(
            &format!("/api/chat?shop={STORE}"),
            json!({ "messages": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Messages must be an array"
    );

    assert!(harness.provider.requests().is_empty());
}

#[tokio::test]
async fn test_chat_streams_reply_and_persists_turn() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, vec![text_reply(&["Hello", ", welcome!"])]).await;

    let response = harness
        .router()
        .oneshot(chat_request(
            &format!("/api/chat?shop={STORE}&logged_in_customer_id=42"),
            json!({ "messages": [{ "role": "user", "content": "hi there" }] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-session-id"], "customer-42");
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_text(response).await, "Hello, welcome!");

    let response = harness
        .router()
        .oneshot(get(&format!(
            "/api/conversation?shop={STORE}&logged_in_customer_id=42"
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["sessionId"], "customer-42");
    assert_eq!(body["sessionType"], "customer");

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "hi there");
    assert_eq!(messages[1]["content"], "Hello, welcome!");

    let thread = harness
        .orchestrator
        .conversations()
        .history("customer-42", STORE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(thread.messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_chat_upstream_failure_is_a_json_error() {
    let harness = Harness::in_memory(vec![Step::Fail]).await;

    let response = harness
        .router()
        .oneshot(chat_request(
            &format!("/api/chat?shop={STORE}"),
            json!({ "messages": [{ "role": "user", "content": "hello" }] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "upstream_error");
    assert!(!body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("overloaded"));
}

#[tokio::test]
async fn test_unknown_session_has_empty_history() {
    let harness = Harness::in_memory(Vec::new()).await;

    let response = harness
        .router()
        .oneshot(get(&format!("/api/conversation?shop={STORE}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "messages": [] }));

    let response = harness
        .router()
        .oneshot(get(&format!(
            "/api/conversation?shop={STORE}&sessionId=anon-1-abcdefg"
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["sessionId"], "anon-1-abcdefg");
    assert_eq!(body["messages"], json!([]));
}

#[tokio::test]
async fn test_unsendable_customer_id_is_ignored_on_chat_and_history() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, vec![text_reply(&["Hi!"])]).await;

    let response = harness
        .router()
        .oneshot(chat_request(
            &format!("/api/chat?shop={STORE}&logged_in_customer_id=42%0A"),
            json!({ "messages": [{ "role": "user", "content": "hello" }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = response.headers()["x-session-id"].to_str().unwrap().to_string();
    assert!(session_id.starts_with("anon-"));
    body_text(response).await;

    let response = harness
        .router()
        .oneshot(get(&format!(
            "/api/conversation?shop={STORE}&logged_in_customer_id=42%0A"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "messages": [] }));

    let response = harness
        .router()
        .oneshot(get(&format!(
            "/api/conversation?shop={STORE}&logged_in_customer_id=42%0A&sessionId={session_id}"
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["sessionId"], session_id.as_str());
    assert_eq!(body["sessionType"], "anonymous");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_routes_require_owner_token() {
    let harness = Harness::in_memory(Vec::new()).await;
    let uri = format!("/api/products/embeddings?shop={STORE}");

    let response = harness
        .router()
        .oneshot(admin(Method::GET, &uri, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .router()
        .oneshot(admin(Method::GET, &uri, Some("wrong"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .router_with_token(None)
        .oneshot(admin(Method::GET, &uri, Some(ADMIN_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"]["code"], "forbidden");
}

#[tokio::test]
async fn test_embedding_run_and_status() {
    let harness = Harness::in_memory(Vec::new()).await;
    harness
        .seed(vec![
            product("p1", "Trail Runner", 90.0),
            product("p2", "Rain Jacket", 120.0),
        ])
        .await;
    let uri = format!("/api/products/embeddings?shop={STORE}");

    let response = harness
        .router()
        .oneshot(admin(Method::GET, &uri, Some(ADMIN_TOKEN), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["storeId"], STORE);
    assert_eq!(body["status"]["pending"], 2);

    let response = harness
        .router()
        .oneshot(admin(
            Method::POST,
            &uri,
            Some(ADMIN_TOKEN),
            Some(json!({ "action": "generate" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["action"], "generate");
    assert_eq!(body["report"]["embedded"], 2);
    assert_eq!(body["status"]["pending"], 0);
    assert_eq!(body["status"]["embedded"], 2);
}

#[tokio::test]
async fn test_ai_config_update() {
    let harness = Harness::in_memory(Vec::new()).await;
    let uri = format!("/api/store/ai-config?shop={STORE}");

    let response = harness
        .router()
        .oneshot(admin(
            Method::PUT,
            &uri,
            Some(ADMIN_TOKEN),
            Some(json!({
                "personality": "casual",
                "instructions": "Mention free shipping over $75.",
                "greeting": "Hey!"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let store = harness
        .storage
        .stores
        .find_store(STORE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        store.ai_config.instructions.as_deref(),
        Some("Mention free shipping over $75.")
    );
    assert_eq!(store.ai_config.extra["greeting"], "Hey!");

    let response = harness
        .router()
        .oneshot(admin(Method::PUT, &uri, None, Some(json!({}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
