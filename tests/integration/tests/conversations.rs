//! Session resolution and the conversation store over SQLite.

use shopassist_agent::{ConversationStore, RequestContext};
use shopassist_core::{Role, SessionType, StoreRepository};
use shopassist_integration_tests::{sqlite_storage, STORE};

fn conversations(storage: &shopassist_storage::Storage) -> ConversationStore {
    ConversationStore::new(storage.stores.clone(), storage.conversations.clone())
}

#[test]
fn test_resolution_is_deterministic() {
    let admin = RequestContext {
        shop: Some(STORE.to_string()),
        is_admin: true,
        ..Default::default()
    };
    let customer = RequestContext {
        shop: Some(STORE.to_string()),
        customer_id: Some("8812".to_string()),
        ..Default::default()
    };

    for _ in 0..3 {
        let session = admin.resolve().unwrap();
        assert_eq!(session.session_id, format!("admin-{STORE}"));
        assert_eq!(session.session_type, SessionType::Admin);

        let session = customer.resolve().unwrap();
        assert_eq!(session.session_id, "customer-8812");
        assert_eq!(session.session_type, SessionType::Customer);
    }

    let anonymous = RequestContext {
        shop: Some(STORE.to_string()),
        ..Default::default()
    };
    assert_ne!(
        anonymous.resolve().unwrap().session_id,
        anonymous.resolve().unwrap().session_id
    );
    assert!(anonymous.resolve_existing().unwrap().is_none());
}

#[tokio::test]
async fn test_new_session_has_empty_history() {
    let (storage, _dir) = sqlite_storage().await;
    let store = conversations(&storage);

    let history = store.history("anon-1-abcdefg", STORE).await.unwrap();
    assert!(history.is_none());
}

#[tokio::test]
async fn test_user_then_assistant_are_persisted_in_order() {
    let (storage, _dir) = sqlite_storage().await;
    let store = conversations(&storage);
    let session = RequestContext {
        shop: Some(STORE.to_string()),
        customer_id: Some("5".to_string()),
        ..Default::default()
    }
    .resolve()
    .unwrap();

    let thread = store.get_or_create(&session).await.unwrap();
    assert!(thread.messages.is_empty());
    store
        .append(&thread.conversation.id, Role::User, "Do you sell tents?")
        .await
        .unwrap();
    store
        .append(&thread.conversation.id, Role::Assistant, "Yes, two models.")
        .await
        .unwrap();

    let history = store
        .history(&session.session_id, STORE)
        .await
        .unwrap()
        .unwrap();
    let turns: Vec<(Role, &str)> = history
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (Role::User, "Do you sell tents?"),
            (Role::Assistant, "Yes, two models."),
        ]
    );

    let created = storage.stores.find_store(STORE).await.unwrap().unwrap();
    assert_eq!(created.name, "acme");
}

#[tokio::test]
async fn test_concurrent_first_contact_yields_one_conversation() {
    let (storage, _dir) = sqlite_storage().await;
    let store = conversations(&storage);
    let session = RequestContext {
        shop: Some(STORE.to_string()),
        customer_id: Some("77".to_string()),
        ..Default::default()
    }
    .resolve()
    .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = store.clone();
            let session = session.clone();
            tokio::spawn(async move { store.get_or_create(&session).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().conversation.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}
