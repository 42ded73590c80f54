//! Conversation store.
//!
//! Get-or-create, append and history over `(session, store)`, on top of the
//! store and conversation repositories.

use crate::session::ResolvedSession;
use crate::Result;
use serde::Serialize;
use shopassist_core::{
    ChatMessage, Conversation, ConversationRepository, Role, StoreRepository,
};
use std::sync::Arc;
use tracing::debug;

/// A conversation with its ordered message history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationThread {
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
}

/// Persistent turn history, scoped per store.
#[derive(Clone)]
pub struct ConversationStore {
    stores: Arc<dyn StoreRepository>,
    conversations: Arc<dyn ConversationRepository>,
}

impl ConversationStore {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        conversations: Arc<dyn ConversationRepository>,
    ) -> Self {
        Self {
            stores,
            conversations,
        }
    }

    /// Load the session's conversation, creating it (and a minimal store
    /// record on first contact) if absent.
    pub async fn get_or_create(&self, session: &ResolvedSession) -> Result<ConversationThread> {
        let existing = self
            .conversations
            .find_conversation(&session.store_id, &session.session_id)
            .await?;

        let conversation = match existing {
            Some(conversation) => conversation,
            None => {
                self.stores.ensure_store(&session.store_id).await?;
                let created = self
                    .conversations
                    .create_conversation(session.new_conversation())
                    .await?;
                debug!(
                    session_id = %session.session_id,
                    store_id = %session.store_id,
                    session_type = %session.session_type,
                    "Opened conversation"
                );
                created
            }
        };

        let messages = self.conversations.messages(&conversation.id).await?;
        Ok(ConversationThread {
            conversation,
            messages,
        })
    }

    /// Append one message. No de-duplication is performed.
    pub async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage> {
        Ok(self
            .conversations
            .append_message(conversation_id, role, content)
            .await?)
    }

    /// Ordered history, or `None` when the session has no conversation yet.
    pub async fn history(
        &self,
        session_id: &str,
        store_id: &str,
    ) -> Result<Option<ConversationThread>> {
        let Some(conversation) = self
            .conversations
            .find_conversation(store_id, session_id)
            .await?
        else {
            return Ok(None);
        };

        let messages = self.conversations.messages(&conversation.id).await?;
        Ok(Some(ConversationThread {
            conversation,
            messages,
        }))
    }
}
