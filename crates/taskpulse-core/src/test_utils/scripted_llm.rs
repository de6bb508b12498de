use crate::core_types::{LLMResponse, LLMStreamChunk, Message};
use crate::errors::AssistantError;
use crate::llm::{LLMStream, ToolMetadata, LLM};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// How a streamed reply ends after its text.
#[derive(Clone)]
pub enum StreamBreak {
    /// Sends nothing more and never finishes.
    Stall,
    /// Fails with the given error instead of finishing.
    Fail(AssistantError),
}

/// A model that replays queued responses and records every prompt.
///
/// Once the queue is empty it repeats the `fallback` response, or fails when
/// none is set. Streaming splits text into word-sized deltas.
pub struct ScriptedLLM {
    responses: Mutex<VecDeque<Result<LLMResponse, AssistantError>>>,
    fallback: Option<LLMResponse>,
    delay: Option<Duration>,
    chunk_delay: Option<Duration>,
    stream_break: Option<StreamBreak>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLLM {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<LLMResponse, AssistantError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            fallback: None,
            delay: None,
            chunk_delay: None,
            stream_break: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, response: LLMResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Pause before each streamed chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Every streamed reply stops this way after its text.
    pub fn with_stream_break(mut self, stream_break: StreamBreak) -> Self {
        self.stream_break = Some(stream_break);
        self
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    async fn next(&self, messages: Vec<Message>) -> Result<LLMResponse, AssistantError> {
        self.requests.lock().unwrap().push(messages);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AssistantError::InternalError("script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        _tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AssistantError> {
        self.next(messages).await
    }

    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        _tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMStream, AssistantError> {
        let response = self.next(messages).await?;

        let mut chunks: Vec<Result<LLMStreamChunk, AssistantError>> = response
            .content
            .as_deref()
            .unwrap_or_default()
            .split_inclusive(' ')
            .map(|word| Ok(LLMStreamChunk::TextDelta(word.to_string())))
            .collect();
        match self.stream_break.clone() {
            Some(StreamBreak::Fail(error)) => chunks.push(Err(error)),
            Some(StreamBreak::Stall) => {}
            None => {
                if let Some(calls) = response.tool_calls.filter(|c| !c.is_empty()) {
                    chunks.push(Ok(LLMStreamChunk::ToolCalls(calls)));
                }
                chunks.push(Ok(LLMStreamChunk::Finished {
                    finish_reason: response.finish_reason,
                }));
            }
        }

        let chunk_delay = self.chunk_delay;
        let stall = matches!(self.stream_break, Some(StreamBreak::Stall));
        let replay = stream::iter(chunks).then(move |chunk| async move {
            if let Some(delay) = chunk_delay {
                tokio::time::sleep(delay).await;
            }
            chunk
        });
        if stall {
            Ok(Box::pin(replay.chain(stream::pending())))
        } else {
            Ok(Box::pin(replay))
        }
    }
}
