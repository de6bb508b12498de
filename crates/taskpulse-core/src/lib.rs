//! Function-calling assistant core for Asana project insights.
//!
//! Turns a natural-language question into a sequence of read-only Asana
//! queries chosen by a language model, keeps the multi-turn conversation
//! within a context budget, streams the answer and derives a chart
//! description from the data the queries returned.
//!
//! # Architecture Overview
//!
//! - **Tool registry** (`tools`): typed tool definitions, schema export and argument validation
//! - **Tool executor** (`executor`): timeouts, retries and the `ToolResult` envelope
//! - **Conversation manager** (`conversation`): ordered history, token budget, truncation
//! - **Response generators** (`assistant`): the turn loop, streamed or not, behind one session
//! - **Visualization builder** (`visualization`): picks one chart from a turn's results
//! - **Boundaries** (`llm`, `asana`): provider clients for the model and the Asana REST API

pub mod asana;
pub mod assistant;
pub mod assistant_factory;
pub mod config;
pub mod conversation;
pub mod core_types;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod tools;
pub mod visualization;

pub use asana::{AsanaApi, AsanaHttpClient, AsanaScope};
pub use assistant::{Assistant, AssistantResponse, ResponseStream, StreamEvent, TurnSummary};
pub use assistant_factory::AssistantFactory;
pub use config::*;
pub use errors::{AsanaError, AssistantError};
pub use executor::{ToolExecutor, ToolResult};
pub use llm::LLM;
pub use visualization::{ChartKind, VisualizationBuilder, VisualizationSpec};

#[cfg(test)]
pub mod test_utils;
