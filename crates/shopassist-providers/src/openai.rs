//! OpenAI chat completions provider.
//!
//! Streams `/chat/completions` over server-sent events. Tool call fragments
//! are accumulated per `index` and emitted as complete [`StreamEvent::ToolCall`]s
//! once the model finishes the step.

use crate::{
    ChatOptions, CompletionStream, Message, MessageRole, Provider, ProviderError, Result,
    StopReason, StreamEvent, ToolChoice, ToolDefinition, ToolUse, Usage,
};
use async_stream::stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shopassist_core::config::OpenAiConfig;
use shopassist_core::SecretString;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Default OpenAI API base URL.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI GPT provider.
pub struct OpenAIProvider {
    /// HTTP client.
    client: Client,

    /// API key.
    api_key: SecretString,

    /// API base URL.
    api_base: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key.
    pub fn new(api_key: impl Into<SecretString>) -> Result<Self> {
        Self::build(api_key.into(), DEFAULT_API_BASE, Duration::from_secs(300))
    }

    /// Create a provider from the `openai` config section.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .credential()
            .cloned()
            .ok_or_else(|| ProviderError::config("OpenAI API key is not configured"))?;
        Self::build(
            api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn build(api_key: SecretString, api_base: &str, timeout: Duration) -> Result<Self> {
        if api_key.is_empty() {
            return Err(ProviderError::config("API key is required"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Set the API base URL (for compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert messages to OpenAI format.
    fn convert_messages(messages: &[Message]) -> Vec<OpenAIMessage> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::Tool => "tool",
                };

                let tool_calls: Vec<OpenAIToolCall> = msg
                    .tool_calls
                    .iter()
                    .map(|call| OpenAIToolCall {
                        id: call.id.clone(),
                        call_type: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: call.name.clone(),
                            arguments: call.input.to_string(),
                        },
                    })
                    .collect();

                // An assistant turn that only calls tools carries no content.
                let content = if msg.content.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(msg.content.clone())
                };

                OpenAIMessage {
                    role: role.to_string(),
                    content,
                    tool_call_id: msg.tool_call_id.clone(),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                }
            })
            .collect()
    }

    /// Convert tools to OpenAI format.
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAITool> {
        tools
            .iter()
            .map(|t| OpenAITool {
                tool_type: "function".to_string(),
                function: OpenAIFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect()
    }

    fn convert_tool_choice(choice: &ToolChoice) -> Value {
        match choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
        }
    }

    /// Map a non-success response to a provider error.
    async fn error_from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let message = response
            .json::<OpenAIError>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            401 | 403 => ProviderError::unauthorized(message),
            429 => ProviderError::rate_limited(message, retry_after),
            _ => ProviderError::upstream(status, message),
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<CompletionStream> {
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: Self::convert_messages(messages),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            tools: (!options.tools.is_empty()).then(|| Self::convert_tools(&options.tools)),
            tool_choice: options
                .tool_choice
                .as_ref()
                .filter(|_| !options.tools.is_empty())
                .map(Self::convert_tool_choice),
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
            user: options.user,
        };

        debug!(
            "Sending streaming request to OpenAI: model={}, messages={}",
            model,
            request.messages.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let mut events = response.bytes_stream().eventsource();

        let stream = stream! {
            let mut started = false;
            let mut pending: BTreeMap<usize, PendingToolCall> = BTreeMap::new();
            let mut stop_reason = None;
            let mut usage = Usage::default();
            let mut done = false;

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(ProviderError::stream(e.to_string()));
                        return;
                    }
                };

                if event.data.is_empty() {
                    continue;
                }
                if event.data == "[DONE]" {
                    done = true;
                    break;
                }

                let chunk: OpenAIStreamChunk = match serde_json::from_str(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Failed to parse SSE event: {}", e);
                        continue;
                    }
                };

                if let Some(error) = chunk.error {
                    yield Ok(StreamEvent::Error { message: error.message });
                    return;
                }

                if !started {
                    started = true;
                    yield Ok(StreamEvent::Start {
                        id: chunk.id.clone().unwrap_or_default(),
                        model: chunk.model.clone().unwrap_or_default(),
                    });
                }

                if let Some(u) = chunk.usage {
                    usage = Usage {
                        input_tokens: u.prompt_tokens,
                        output_tokens: u.completion_tokens,
                    };
                }

                for choice in chunk.choices {
                    if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                        yield Ok(StreamEvent::ContentDelta { delta: content });
                    }

                    for fragment in choice.delta.tool_calls.unwrap_or_default() {
                        pending.entry(fragment.index).or_default().absorb(fragment);
                    }

                    if let Some(reason) = choice.finish_reason {
                        stop_reason = Some(StopReason::from_finish_reason(&reason));
                    }
                }
            }

            if !done && stop_reason.is_none() {
                yield Err(ProviderError::stream("stream ended before completion"));
                return;
            }

            let has_tool_calls = !pending.is_empty();
            for (index, call) in pending {
                yield Ok(StreamEvent::ToolCall(call.finish(index)));
            }

            let stop_reason = stop_reason.unwrap_or(if has_tool_calls {
                StopReason::ToolUse
            } else {
                StopReason::EndTurn
            });
            yield Ok(StreamEvent::End { stop_reason, usage });
        };

        Ok(Box::pin(stream))
    }
}

/// Tool call being assembled from streamed fragments.
#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn absorb(&mut self, fragment: OpenAIToolCallDelta) {
        if let Some(id) = fragment.id {
            self.id = id;
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                self.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                self.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self, index: usize) -> ToolUse {
        let input = if self.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&self.arguments).unwrap_or_else(|e| {
                warn!("Tool call {} has malformed arguments: {}", self.name, e);
                json!({})
            })
        };

        let id = if self.id.is_empty() {
            format!("call_{}", index)
        } else {
            self.id
        };

        ToolUse {
            id,
            name: self.name,
            input,
        }
    }
}

// Internal types for OpenAI API

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    stream: bool,
    stream_options: StreamOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

#[derive(Serialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

// Streaming types

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
    error: Option<OpenAIErrorDetail>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAIToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
