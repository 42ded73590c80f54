//! Chat turns end to end with a scripted completion service.

use futures::StreamExt;
use serde_json::json;
use shopassist_agent::{ChatEvent, ChatOrchestrator, RequestContext, ToolRegistry};
use shopassist_core::Role;
use shopassist_integration_tests::{
    product, search_call, sqlite_storage, tagged, text_reply, Harness, Step, STORE,
};
use shopassist_providers::{MessageRole, OpenAIProvider, ToolChoice};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn customer(id: &str) -> RequestContext {
    RequestContext {
        shop: Some(STORE.to_string()),
        customer_id: Some(id.to_string()),
        ..Default::default()
    }
}

async fn persisted(harness: &Harness, session_id: &str) -> Vec<(Role, String)> {
    harness
        .orchestrator
        .conversations()
        .history(session_id, STORE)
        .await
        .unwrap()
        .map(|t| t.messages.into_iter().map(|m| (m.role, m.content)).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_tool_round_answers_from_the_catalog() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(
        storage,
        vec![
            search_call("call_1", "headphones under $50"),
            text_reply(&["Studio Headphones ", "are $40.00."]),
        ],
    )
    .await;
    harness
        .seed(vec![
            tagged(product("h40", "Studio Headphones", 40.0), &["headphones"]),
            tagged(product("h80", "Pro Headphones", 80.0), &["headphones"]),
        ])
        .await;

    let stream = harness
        .orchestrator
        .chat(&customer("1"), "Any headphones under $50?")
        .await
        .unwrap();
    let events: Vec<ChatEvent> = stream.map(|e| e.unwrap()).collect().await;

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Delta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Studio Headphones are $40.00.");

    let requests = harness.provider.requests();
    let tool_result = requests[1]
        .0
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    let result: serde_json::Value = serde_json::from_str(&tool_result.content).unwrap();
    let ids: Vec<&str> = result["products"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["h40"]);

    assert_eq!(
        persisted(&harness, "customer-1").await,
        vec![
            (Role::User, "Any headphones under $50?".to_string()),
            (Role::Assistant, "Studio Headphones are $40.00.".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_tool_loop_stops_at_the_step_ceiling() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, vec![search_call("call_x", "tents")]).await;
    harness
        .seed(vec![tagged(product("t1", "Dome Tent", 150.0), &["tents"])])
        .await;

    let stream = harness
        .orchestrator
        .chat(&customer("2"), "tents")
        .await
        .unwrap();
    let events: Vec<_> = stream.collect().await;

    assert!(matches!(
        events.last(),
        Some(Ok(ChatEvent::Finished { .. }))
    ));
    let tool_calls = events
        .iter()
        .filter(|e| matches!(e, Ok(ChatEvent::ToolCall { .. })))
        .count();
    assert_eq!(tool_calls, 2);

    let requests = harness.provider.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].1.tool_choice, Some(ToolChoice::None));
    assert_eq!(persisted(&harness, "customer-2").await.len(), 2);
}

#[tokio::test]
async fn test_upstream_failure_leaves_only_the_user_turn() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, vec![Step::Fail]).await;

    let stream = harness
        .orchestrator
        .chat(&customer("3"), "hello")
        .await
        .unwrap();
    let events: Vec<_> = stream.collect().await;

    assert_eq!(events.len(), 1);
    assert!(events[0].is_err());
    assert_eq!(
        persisted(&harness, "customer-3").await,
        vec![(Role::User, "hello".to_string())]
    );
}

#[tokio::test]
async fn test_persisted_history_is_replayed_to_the_model() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(
        storage,
        vec![text_reply(&["Hi there!"]), text_reply(&["Tents start at $150."])],
    )
    .await;

    for message in ["hello", "how much are tents?"] {
        let stream = harness
            .orchestrator
            .chat(&customer("4"), message)
            .await
            .unwrap();
        let _: Vec<_> = stream.collect().await;
    }

    let requests = harness.provider.requests();
    let replayed: Vec<(MessageRole, &str)> = requests[1]
        .0
        .iter()
        .skip(1)
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        replayed,
        vec![
            (MessageRole::User, "hello"),
            (MessageRole::Assistant, "Hi there!"),
            (MessageRole::User, "how much are tents?"),
        ]
    );
}

#[tokio::test]
async fn test_reply_cut_off_mid_stream_is_not_persisted() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\n",
        json!({"id": "chatcmpl-9", "choices": [{"delta": {"content": "We have the Aur"}, "finish_reason": null}]})
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let (storage, _dir) = sqlite_storage().await;
    let provider = OpenAIProvider::new("sk-test")
        .unwrap()
        .with_base_url(format!("{}/v1", server.uri()));
    let orchestrator = ChatOrchestrator::new(
        Arc::new(provider),
        Arc::new(ToolRegistry::new()),
        storage.stores.clone(),
        storage.conversations.clone(),
        storage.catalog.clone(),
    );

    let stream = orchestrator
        .chat(&customer("5"), "Do you have the Aurora lamp?")
        .await
        .unwrap();
    let events: Vec<_> = stream.collect().await;

    assert!(events.last().unwrap().is_err());
    assert!(!events
        .iter()
        .any(|e| matches!(e, Ok(ChatEvent::Finished { .. }))));

    let thread = orchestrator
        .conversations()
        .history("customer-5", STORE)
        .await
        .unwrap()
        .unwrap();
    let turns: Vec<(Role, &str)> = thread
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(turns, vec![(Role::User, "Do you have the Aurora lamp?")]);
}
