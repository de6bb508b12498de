//! Error types for the assistant core
//!
//! Two families live here. `AssistantError` covers everything that can fail a
//! registration, a model call or a whole turn. `AsanaError` is the typed
//! condition raised at the Asana data boundary; the tool executor folds it into
//! a `ToolResult` so a single failed query never aborts the turn.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AssistantError {
    #[error("Invalid arguments for tool '{tool_name}': {}", violations.join("; "))]
    InvalidArguments {
        tool_name: String,
        violations: Vec<String>,
    },
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
    #[error("Maximum number of model iterations ({limit}) exceeded")]
    MaxIterationsExceeded { limit: usize },
    #[error("Language model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Model API request failed with status {status}: {message}")]
    ModelHttp { status: u16, message: String },
    #[error("Model request failed: {0}")]
    ModelTransport(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("A turn is already in progress for this session")]
    SessionBusy,
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::ModelTransport(err.to_string())
    }
}

/// Conditions raised by the Asana data collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsanaError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Asana rejected the credentials: {0}")]
    Unauthorized(String),
    #[error("Asana rate limit reached")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Asana request timed out")]
    Timeout,
    #[error("Asana transport failure: {0}")]
    Transport(String),
    #[error("Unexpected Asana response: {0}")]
    InvalidResponse(String),
    #[error("Missing configuration: {0}")]
    MissingScope(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AsanaError {
    /// Transient conditions are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AsanaError::RateLimited { .. } | AsanaError::Timeout | AsanaError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for AsanaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AsanaError::Timeout
        } else if err.is_decode() {
            AsanaError::InvalidResponse(err.to_string())
        } else {
            AsanaError::Transport(err.to_string())
        }
    }
}
