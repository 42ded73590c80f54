//! Chat model providers for ShopAssist.
//!
//! A provider turns a conversation plus tool definitions into a stream of
//! [`StreamEvent`]s. Text arrives as deltas; tool calls arrive fully
//! assembled, after the text of the step and before [`StreamEvent::End`].
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use shopassist_providers::{ChatOptions, Message, OpenAIProvider, Provider, StreamEvent};
//!
//! let provider = OpenAIProvider::new("sk-...")?;
//! let mut stream = provider
//!     .chat_stream("gpt-4o-mini", &[Message::user("Hello!")], ChatOptions::default())
//!     .await?;
//! while let Some(event) = stream.next().await {
//!     if let StreamEvent::ContentDelta { delta } = event? {
//!         print!("{delta}");
//!     }
//! }
//! ```

mod error;
mod types;

pub mod openai;

pub use error::{ProviderError, Result};
pub use openai::OpenAIProvider;
pub use types::*;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of completion events for streaming responses.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A model provider that can stream chat completions.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get provider name.
    fn name(&self) -> &str;

    /// Generate a streaming chat completion.
    ///
    /// Errors returned here happen before any output; errors inside the
    /// stream happen after some events may already have been delivered.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<CompletionStream>;
}
