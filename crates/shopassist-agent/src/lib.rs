//! Conversation orchestration for ShopAssist.
//!
//! This crate provides:
//! - Session resolution from request context
//! - The conversation store (get-or-create, append, history)
//! - The tool registry and the `searchProducts` tool
//! - The bounded, streaming tool-calling orchestrator

pub mod conversation;
pub mod error;
pub mod prompt;
pub mod runtime;
pub mod session;
pub mod tools;

pub use conversation::{ConversationStore, ConversationThread};
pub use error::AgentError;
pub use prompt::{PromptBuilder, StoreSnapshot};
pub use runtime::{ChatEvent, ChatOrchestrator, ChatStream, PreparedChat, RuntimeConfig};
pub use session::{generate_anonymous_id, RequestContext, ResolvedSession};
pub use tools::{SearchProductsTool, Tool, ToolContext, ToolRegistry, ToolResult};

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
