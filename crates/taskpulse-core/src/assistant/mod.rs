//! Consumer boundary of the assistant core
//!
//! `Assistant` serves one conversation session. Turns are serialized: each
//! holds the session lock from the moment the user message is recorded until
//! the turn ends, and a query arriving meanwhile either waits for the lock or
//! is refused with `SessionBusy`, depending on the configured `BusyPolicy`.
//!
//! `generate_response` returns the whole answer at once.
//! `generate_streaming_response` returns a stream of `StreamEvent`s produced
//! by a spawned task; dropping the stream cancels the turn before its next
//! model call.

use crate::config::{AssistantSettings, BusyPolicy};
use crate::conversation::{ConversationState, ConversationStats};
use crate::core_types::Message;
use crate::errors::AssistantError;
use crate::executor::{ToolErrorKind, ToolExecutor, ToolResult};
use crate::llm::{ToolMetadata, LLM};
use crate::visualization::VisualizationSpec;
use futures_util::Stream;
use log::{debug, error, info};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

pub mod text;
mod turn;

pub use text::{TextAccumulator, FALLBACK_NOTICE};

use turn::{ChannelSink, DiscardSink, TurnEngine, TurnRecord};

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Error(ToolErrorKind),
}

impl From<&ToolResult> for ToolStatus {
    fn from(result: &ToolResult) -> Self {
        match result.error_kind() {
            None => ToolStatus::Success,
            Some(kind) => ToolStatus::Error(kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub iterations: usize,
    pub tool_calls: usize,
    /// True when the turn hit the iteration cap.
    pub partial: bool,
    pub failure: Option<AssistantError>,
    pub visualization: Option<VisualizationSpec>,
}

/// One item of a streamed turn. Only `TextDelta` carries display text.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    ToolStarted {
        call_id: String,
        tool_name: String,
    },
    ToolFinished {
        call_id: String,
        tool_name: String,
        status: ToolStatus,
    },
    VisualizationReady(VisualizationSpec),
    Completed(TurnSummary),
    Failed(AssistantError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed(_) | StreamEvent::Failed(_))
    }
}

pub type ResponseStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

#[derive(Debug, Clone)]
pub struct AssistantResponse {
    pub text: String,
    pub tool_results: Vec<ToolResult>,
    pub visualization: Option<VisualizationSpec>,
    pub iterations: usize,
    pub failure: Option<AssistantError>,
}

impl AssistantResponse {
    pub fn is_partial(&self) -> bool {
        self.failure.is_some()
    }
}

impl From<TurnRecord> for AssistantResponse {
    fn from(record: TurnRecord) -> Self {
        Self {
            text: record.text,
            tool_results: record.tool_results,
            visualization: record.visualization,
            iterations: record.iterations,
            failure: record.failure,
        }
    }
}

impl TurnRecord {
    fn summary(&self) -> TurnSummary {
        TurnSummary {
            iterations: self.iterations,
            tool_calls: self.tool_results.len(),
            partial: self.failure.is_some(),
            failure: self.failure.clone(),
            visualization: self.visualization.clone(),
        }
    }
}

/// Per-session state guarded by the session lock.
pub(crate) struct Session {
    pub conversation: ConversationState,
    pub last_visualization: Option<VisualizationSpec>,
}

pub struct Assistant {
    session: Arc<Mutex<Session>>,
    engine: Arc<TurnEngine>,
    busy_policy: BusyPolicy,
}

impl Assistant {
    pub fn new(llm: Arc<dyn LLM>, executor: ToolExecutor, settings: &AssistantSettings) -> Self {
        let executor = Arc::new(executor);
        let conversation = ConversationState::new(executor.registry(), settings.context_budget_tokens)
            .with_system_preamble(settings.system_prompt.clone());

        Self {
            session: Arc::new(Mutex::new(Session {
                conversation,
                last_visualization: None,
            })),
            engine: Arc::new(TurnEngine::new(llm, executor, settings.max_iterations)),
            busy_policy: settings.busy_policy,
        }
    }

    async fn acquire(&self) -> Result<OwnedMutexGuard<Session>, AssistantError> {
        match self.busy_policy {
            BusyPolicy::Queue => Ok(self.session.clone().lock_owned().await),
            BusyPolicy::Reject => self.session.clone().try_lock_owned().map_err(|_| {
                info!("Refusing query: a turn is already in progress");
                AssistantError::SessionBusy
            }),
        }
    }

    /// Runs a whole turn and returns the final answer.
    ///
    /// A turn stopped by the iteration cap still returns `Ok`, with the
    /// fallback notice appended and `failure` set. Only an unreachable model
    /// or a broken prompt fails the call.
    pub async fn generate_response(&self, query: &str) -> Result<AssistantResponse, AssistantError> {
        let mut session = self.acquire().await?;
        let record = self.engine.run(&mut *session, query, &mut DiscardSink).await?;
        session.last_visualization = record.visualization.clone();
        Ok(record.into())
    }

    /// Starts a turn whose events arrive as a stream.
    ///
    /// Every stream the consumer reads to the end finishes with exactly one
    /// `Completed` or `Failed` event.
    pub async fn generate_streaming_response(
        &self,
        query: &str,
    ) -> Result<ResponseStream, AssistantError> {
        let mut session = self.acquire().await?;
        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
        let engine = self.engine.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            let mut sink = ChannelSink { tx };
            let terminal = match engine.run(&mut *session, &query, &mut sink).await {
                Ok(record) if record.cancelled => {
                    info!("Streaming turn cancelled by the consumer");
                    return;
                }
                Ok(record) => {
                    session.last_visualization = record.visualization.clone();
                    StreamEvent::Completed(record.summary())
                }
                Err(e) => {
                    error!("Streaming turn failed: {}", e);
                    StreamEvent::Failed(e)
                }
            };
            if sink.tx.send(terminal).await.is_err() {
                debug!("Consumer dropped the stream before the terminal event");
            }
        });

        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }))
    }

    /// Chart for the most recently completed turn.
    pub async fn generate_visualization(&self) -> Option<VisualizationSpec> {
        self.session.lock().await.last_visualization.clone()
    }

    /// Clears the conversation, keeping the system preamble.
    pub async fn reset(&self) -> Result<(), AssistantError> {
        let mut session = self.acquire().await?;
        session.conversation.reset();
        session.last_visualization = None;
        Ok(())
    }

    pub async fn history(&self) -> Vec<Message> {
        self.session.lock().await.conversation.history()
    }

    pub async fn stats(&self) -> ConversationStats {
        self.session.lock().await.conversation.stats()
    }

    /// Tool schemas in the order the model sees them.
    pub fn tools(&self) -> Vec<ToolMetadata> {
        self.engine.executor().registry().list()
    }
}
