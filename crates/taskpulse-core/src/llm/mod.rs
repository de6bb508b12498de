//! Language model provider abstractions.
//!
//! Defines the `LLM` trait the conversation loop talks to, the OpenAI-compatible
//! provider, and the retry wrapper that turns transient failures into bounded
//! backoff before surfacing `ModelUnavailable`.

pub use crate::core_types::{LLMResponse, LLMStreamChunk, Message};
use crate::errors::AssistantError;
use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

pub mod providers;
pub mod retry;
pub mod utils;

pub use retry::RetryingLLM;
pub use utils::LLMFactory;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamChunk, AssistantError>> + Send>>;

#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AssistantError>;

    /// Streams the response. Providers without native streaming deliver the
    /// whole answer as a single text chunk.
    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMStream, AssistantError> {
        let response = self.generate(messages, tools).await?;
        Ok(response_stream(response))
    }
}

/// Replays a complete response as stream chunks.
pub fn response_stream(response: LLMResponse) -> LLMStream {
    let mut chunks = Vec::new();
    if let Some(content) = response.content.filter(|c| !c.is_empty()) {
        chunks.push(Ok(LLMStreamChunk::TextDelta(content)));
    }
    if let Some(tool_calls) = response.tool_calls.filter(|c| !c.is_empty()) {
        chunks.push(Ok(LLMStreamChunk::ToolCalls(tool_calls)));
    }
    chunks.push(Ok(LLMStreamChunk::Finished {
        finish_reason: response.finish_reason,
    }));
    Box::pin(stream::iter(chunks))
}
