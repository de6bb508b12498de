//! The conversation loop behind both response modes.
//!
//! One turn moves through `AWAITING_MODEL -> (TOOL_CALLS_REQUESTED ->
//! EXECUTING_TOOLS -> AWAITING_MODEL)* -> FINAL_ANSWER`. The non-streaming
//! generator runs it against a sink that drops events; the streaming generator
//! runs it against a channel. Text is assembled by one `TextAccumulator` in
//! both cases, so the two modes produce the same answer.

use super::text::{TextAccumulator, FALLBACK_NOTICE};
use super::{Session, StreamEvent, ToolStatus};
use crate::core_types::{LLMStreamChunk, Message, ToolCall};
use crate::errors::AssistantError;
use crate::executor::{ToolExecutor, ToolResult};
use crate::llm::LLM;
use crate::visualization::{VisualizationBuilder, VisualizationSpec};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Where turn events go.
#[async_trait]
pub(crate) trait TurnSink: Send {
    /// Whether model output should be consumed as a stream.
    fn streaming(&self) -> bool;

    /// Delivers an event. Returns false once the consumer is gone.
    async fn emit(&mut self, event: StreamEvent) -> bool;

    fn is_closed(&self) -> bool;
}

/// Sink for the non-streaming generator.
pub(crate) struct DiscardSink;

#[async_trait]
impl TurnSink for DiscardSink {
    fn streaming(&self) -> bool {
        false
    }

    async fn emit(&mut self, _event: StreamEvent) -> bool {
        true
    }

    fn is_closed(&self) -> bool {
        false
    }
}

pub(crate) struct ChannelSink {
    pub tx: mpsc::Sender<StreamEvent>,
}

#[async_trait]
impl TurnSink for ChannelSink {
    fn streaming(&self) -> bool {
        true
    }

    async fn emit(&mut self, event: StreamEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Everything a finished, capped or cancelled turn produced.
#[derive(Debug)]
pub(crate) struct TurnRecord {
    pub text: String,
    pub tool_results: Vec<ToolResult>,
    pub visualization: Option<VisualizationSpec>,
    pub iterations: usize,
    pub failure: Option<AssistantError>,
    pub cancelled: bool,
}

struct ModelReply {
    content: String,
    tool_calls: Vec<ToolCall>,
    cancelled: bool,
}

pub(crate) struct TurnEngine {
    llm: Arc<dyn LLM>,
    executor: Arc<ToolExecutor>,
    max_iterations: usize,
}

impl TurnEngine {
    pub fn new(llm: Arc<dyn LLM>, executor: Arc<ToolExecutor>, max_iterations: usize) -> Self {
        Self {
            llm,
            executor,
            max_iterations,
        }
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    pub async fn run(
        &self,
        session: &mut Session,
        query: &str,
        sink: &mut dyn TurnSink,
    ) -> Result<TurnRecord, AssistantError> {
        info!("Turn started: {}", query);
        session.conversation.append(Message::user(query));

        let mut text = TextAccumulator::new();
        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut visualization: Option<VisualizationSpec> = None;
        let mut iterations = 0;

        for iteration in 1..=self.max_iterations {
            if sink.is_closed() {
                info!("Consumer went away before model call {}; stopping turn", iteration);
                return Ok(TurnRecord {
                    text: text.into_text(),
                    tool_results,
                    visualization,
                    iterations,
                    failure: None,
                    cancelled: true,
                });
            }

            let prompt = session.conversation.build_prompt()?;
            iterations = iteration;
            debug!(
                "Iteration {}: calling model with {} messages and {} tools",
                iteration,
                prompt.messages.len(),
                prompt.tools.len()
            );

            text.begin_segment();
            let reply = if sink.streaming() {
                self.stream_reply(prompt.messages, prompt.tools, &mut text, sink).await?
            } else {
                let response = self.llm.generate(prompt.messages, Some(prompt.tools)).await?;
                let content = response.content.unwrap_or_default();
                text.push(&content);
                ModelReply {
                    content,
                    tool_calls: response.tool_calls.unwrap_or_default(),
                    cancelled: false,
                }
            };

            if reply.cancelled {
                info!("Consumer went away mid-stream; recording partial reply");
                if !reply.content.is_empty() {
                    session
                        .conversation
                        .append(Message::assistant(reply.content, None));
                }
                return Ok(TurnRecord {
                    text: text.into_text(),
                    tool_results,
                    visualization,
                    iterations,
                    failure: None,
                    cancelled: true,
                });
            }

            let calls = assign_call_ids(reply.tool_calls);
            session
                .conversation
                .append(Message::assistant(reply.content, Some(calls.clone())));

            if calls.is_empty() {
                info!("Turn finished after {} iterations", iteration);
                return Ok(TurnRecord {
                    text: text.into_text(),
                    tool_results,
                    visualization,
                    iterations,
                    failure: None,
                    cancelled: false,
                });
            }

            info!("Iteration {}: executing {} tool calls", iteration, calls.len());
            for call in &calls {
                sink.emit(StreamEvent::ToolStarted {
                    call_id: call.id.clone().unwrap_or_default(),
                    tool_name: call.name.clone(),
                })
                .await;
            }

            let batch = self.executor.execute_all(&calls).await;
            for result in &batch {
                session
                    .conversation
                    .append(Message::tool(result.call_id.clone(), result.to_message_content()));
                sink.emit(StreamEvent::ToolFinished {
                    call_id: result.call_id.clone(),
                    tool_name: result.tool_name.clone(),
                    status: ToolStatus::from(result),
                })
                .await;
            }
            tool_results.extend(batch);

            let pick = VisualizationBuilder::build(&tool_results);
            if pick != visualization {
                if let Some(spec) = &pick {
                    debug!("Visualization ready: {:?} from {}", spec.kind, spec.source_tool);
                    sink.emit(StreamEvent::VisualizationReady(spec.clone())).await;
                }
                visualization = pick;
            }
        }

        warn!(
            "Turn stopped at the iteration cap ({}) without a final answer",
            self.max_iterations
        );
        text.begin_segment();
        if let Some(fragment) = text.push(FALLBACK_NOTICE) {
            sink.emit(StreamEvent::TextDelta(fragment)).await;
        }
        session
            .conversation
            .append(Message::assistant(FALLBACK_NOTICE, None));

        Ok(TurnRecord {
            text: text.into_text(),
            tool_results,
            visualization,
            iterations,
            failure: Some(AssistantError::MaxIterationsExceeded {
                limit: self.max_iterations,
            }),
            cancelled: false,
        })
    }

    async fn stream_reply(
        &self,
        messages: Vec<Message>,
        tools: Vec<crate::llm::ToolMetadata>,
        text: &mut TextAccumulator,
        sink: &mut dyn TurnSink,
    ) -> Result<ModelReply, AssistantError> {
        let mut stream = self.llm.generate_stream(messages, Some(tools)).await?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                LLMStreamChunk::TextDelta(delta) => {
                    content.push_str(&delta);
                    if let Some(fragment) = text.push(&delta) {
                        if !sink.emit(StreamEvent::TextDelta(fragment)).await {
                            return Ok(ModelReply {
                                content,
                                tool_calls: Vec::new(),
                                cancelled: true,
                            });
                        }
                    }
                }
                LLMStreamChunk::ToolCalls(calls) => tool_calls.extend(calls),
                LLMStreamChunk::Finished { finish_reason } => {
                    debug!("Model stream finished: {:?}", finish_reason);
                    break;
                }
            }
        }

        Ok(ModelReply {
            content,
            tool_calls,
            cancelled: false,
        })
    }
}

/// Gives every call a unique id, keeping the model's ids where possible.
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            let usable = call
                .id
                .as_ref()
                .is_some_and(|id| !id.is_empty() && !seen.contains(id));
            if !usable {
                call.id = Some(format!("call_{}", uuid::Uuid::new_v4().simple()));
            }
            if let Some(id) = &call.id {
                seen.insert(id.clone());
            }
            call
        })
        .collect()
}
