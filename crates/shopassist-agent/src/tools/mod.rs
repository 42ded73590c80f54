//! Tool execution framework.
//!
//! This module provides:
//! - [`Tool`] trait for implementing tools
//! - [`ToolRegistry`] mapping tool names to handlers
//! - [`SearchProductsTool`], the catalog retrieval tool

mod catalog;

pub use catalog::{SearchProductsTool, SEARCH_PRODUCTS};

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopassist_providers::ToolDefinition;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// A tool that can be called by the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get the tool definition for the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments.
    async fn execute(
        &self,
        tool_use_id: &str,
        args: Value,
        context: &ToolContext,
    ) -> Result<ToolResult>;
}

/// Context for tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Store the conversation belongs to. Tools never reach outside it.
    pub store_id: String,

    /// Session ID.
    pub session_id: String,
}

/// Result of a tool call, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool use ID.
    pub tool_use_id: String,

    /// Output value.
    pub output: Value,

    /// Whether the result is an error.
    #[serde(default)]
    pub is_error: bool,

    /// Execution duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolResult {
    /// Create a successful result.
    pub fn success(tool_use_id: impl Into<String>, output: Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            output,
            is_error: false,
            duration_ms: None,
        }
    }

    /// Create an error result.
    pub fn error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            output: serde_json::json!({ "success": false, "error": message.into() }),
            is_error: true,
            duration_ms: None,
        }
    }

    /// The output as sent back to the model.
    pub fn content(&self) -> String {
        self.output.to_string()
    }
}

/// Registry for available tools.
pub struct ToolRegistry {
    /// Registered tools by name.
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new tool registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().await.insert(name, tool);
    }

    /// Get a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// List all tool names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get all tool definitions, sorted by name.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .read()
            .await
            .values()
            .map(|t| t.definition())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        tool_use_id: &str,
        name: &str,
        args: Value,
        context: &ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .await
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        debug!("Executing tool '{}' with args: {}", name, args);
        let start = Instant::now();
        let mut result = tool.execute(tool_use_id, args, context).await?;
        result.duration_ms = Some(start.elapsed().as_millis() as u64);
        Ok(result)
    }
}
