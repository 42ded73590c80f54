//! Chat orchestration.
//!
//! A turn runs in two phases. [`ChatOrchestrator::prepare`] resolves the
//! session, records the user's message and builds the system prompt; any
//! failure there happens before a byte is streamed. [`ChatOrchestrator::stream`]
//! then drives the completion service for at most `max_steps` steps, executing
//! requested tools between steps, and persists the assistant reply once the
//! model is done. A failed or abandoned stream persists nothing.

use crate::conversation::ConversationStore;
use crate::error::AgentError;
use crate::prompt::PromptBuilder;
use crate::session::{RequestContext, ResolvedSession};
use crate::tools::{ToolContext, ToolRegistry, ToolResult};
use crate::Result;
use async_stream::stream;
use futures::{Stream, StreamExt};
use shopassist_core::config::AssistantConfig;
use shopassist_core::{
    CatalogRepository, ChatMessage, ConversationRepository, Role, StoreRepository,
};
use shopassist_providers::{
    ChatOptions, Message, Provider, StreamEvent, ToolChoice, ToolDefinition,
};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Events delivered to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A chunk of assistant text.
    Delta { text: String },

    /// The model called a tool; its result has been fed back.
    ToolCall { id: String, name: String, success: bool },

    /// The reply is complete and persisted.
    Finished { text: String, message_id: String },
}

/// Stream of chat events for one turn.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Completion model.
    pub model: String,

    /// Temperature for generation.
    pub temperature: f32,

    /// Maximum output tokens per step.
    pub max_tokens: u32,

    /// Maximum model steps per turn, tool round-trips included.
    pub max_steps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&AssistantConfig::default())
    }
}

impl From<&AssistantConfig> for RuntimeConfig {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_steps: config.max_steps.max(1),
        }
    }
}

/// A turn that is ready to stream.
#[derive(Debug, Clone)]
pub struct PreparedChat {
    pub session: ResolvedSession,
    pub conversation_id: String,
    pub system_prompt: String,
    /// Persisted history, ending with the new user message.
    pub messages: Vec<Message>,
}

/// Drives one chat turn from user message to persisted reply.
pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    conversations: ConversationStore,
    stores: Arc<dyn StoreRepository>,
    catalog: Arc<dyn CatalogRepository>,
    prompt: PromptBuilder,
    config: RuntimeConfig,
}

impl ChatOrchestrator {
    /// Create an orchestrator with default settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        stores: Arc<dyn StoreRepository>,
        conversations: Arc<dyn ConversationRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            provider,
            tools,
            conversations: ConversationStore::new(stores.clone(), conversations),
            stores,
            catalog,
            prompt: PromptBuilder::default(),
            config: RuntimeConfig::default(),
        }
    }

    /// Set the runtime configuration.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the prompt builder.
    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    /// The conversation store this orchestrator writes to.
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Get the tool definitions offered to the model.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions().await
    }

    /// Resolve the session, record the user message and build the prompt.
    pub async fn prepare(&self, context: &RequestContext, user_message: &str) -> Result<PreparedChat> {
        if user_message.trim().is_empty() {
            return Err(AgentError::validation("Message must not be empty"));
        }

        let session = context.resolve()?;
        let thread = self.conversations.get_or_create(&session).await?;
        let conversation_id = thread.conversation.id.clone();

        self.conversations
            .append(&conversation_id, Role::User, user_message)
            .await?;

        let snapshot = self
            .prompt
            .snapshot(self.stores.as_ref(), self.catalog.as_ref(), &session.store_id)
            .await?;
        let system_prompt = self.prompt.build(&snapshot);

        let mut messages: Vec<Message> = thread.messages.iter().map(to_model_message).collect();
        messages.push(Message::user(user_message));

        info!(
            session_id = %session.session_id,
            store_id = %session.store_id,
            session_type = %session.session_type,
            history = messages.len(),
            "Chat turn prepared"
        );

        Ok(PreparedChat {
            session,
            conversation_id,
            system_prompt,
            messages,
        })
    }

    /// Stream the reply to a prepared turn.
    pub fn stream(&self, prepared: PreparedChat) -> ChatStream {
        let provider = self.provider.clone();
        let tools = self.tools.clone();
        let conversations = self.conversations.clone();
        let config = self.config.clone();

        Box::pin(stream! {
            let PreparedChat {
                session,
                conversation_id,
                system_prompt,
                messages: history,
            } = prepared;

            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(Message::system(system_prompt));
            messages.extend(history);

            let definitions = tools.definitions().await;
            let tool_context = ToolContext {
                store_id: session.store_id.clone(),
                session_id: session.session_id.clone(),
            };
            let mut reply = String::new();

            for step in 1..=config.max_steps {
                let last_step = step == config.max_steps;
                let tool_choice = if last_step || definitions.is_empty() {
                    ToolChoice::None
                } else {
                    ToolChoice::Auto
                };
                let options = ChatOptions::with_max_tokens(config.max_tokens)
                    .temperature(config.temperature)
                    .tools(definitions.clone())
                    .tool_choice(tool_choice)
                    .user(session.session_id.clone());

                debug!(step, max_steps = config.max_steps, "Requesting completion");

                let mut events = match provider.chat_stream(&config.model, &messages, options).await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(
                            session_id = %session.session_id,
                            retryable = e.is_retryable(),
                            "Completion request failed: {}", e
                        );
                        yield Err(AgentError::from(e));
                        return;
                    }
                };

                let mut step_text = String::new();
                let mut calls = Vec::new();

                while let Some(event) = events.next().await {
                    match event {
                        Ok(StreamEvent::ContentDelta { delta }) => {
                            step_text.push_str(&delta);
                            yield Ok(ChatEvent::Delta { text: delta });
                        }
                        Ok(StreamEvent::ToolCall(call)) => calls.push(call),
                        Ok(StreamEvent::Error { message }) => {
                            warn!(session_id = %session.session_id, "Completion stream error: {}", message);
                            yield Err(AgentError::model_api(message));
                            return;
                        }
                        Ok(StreamEvent::Start { .. }) | Ok(StreamEvent::End { .. }) => {}
                        Err(e) => {
                            warn!(session_id = %session.session_id, "Completion stream failed: {}", e);
                            yield Err(AgentError::from(e));
                            return;
                        }
                    }
                }

                reply.push_str(&step_text);

                if calls.is_empty() {
                    break;
                }
                if last_step {
                    warn!(
                        session_id = %session.session_id,
                        ignored = calls.len(),
                        "Step limit reached; ignoring tool calls"
                    );
                    break;
                }

                messages.push(Message::assistant_with_tools(step_text, calls.clone()));

                for call in calls {
                    let result = match tools
                        .execute(&call.id, &call.name, call.input.clone(), &tool_context)
                        .await
                    {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(tool = %call.name, "Tool call failed: {}", e);
                            ToolResult::error(call.id.clone(), e.to_string())
                        }
                    };

                    yield Ok(ChatEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        success: !result.is_error,
                    });
                    messages.push(Message::tool_result(call.id, result.content()));
                }
            }

            match conversations
                .append(&conversation_id, Role::Assistant, &reply)
                .await
            {
                Ok(message) => {
                    info!(
                        session_id = %session.session_id,
                        store_id = %session.store_id,
                        chars = reply.len(),
                        "Chat turn finished"
                    );
                    yield Ok(ChatEvent::Finished {
                        text: reply,
                        message_id: message.id,
                    });
                }
                Err(e) => yield Err(e),
            }
        })
    }

    /// Prepare and stream in one call.
    pub async fn chat(&self, context: &RequestContext, user_message: &str) -> Result<ChatStream> {
        let prepared = self.prepare(context, user_message).await?;
        Ok(self.stream(prepared))
    }
}

fn to_model_message(message: &ChatMessage) -> Message {
    match message.role {
        Role::User => Message::user(message.content.clone()),
        Role::Assistant => Message::assistant(message.content.clone()),
    }
}
