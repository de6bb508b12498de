//! Tool executor
//!
//! Resolves a model-issued call through the registry, runs it with a timeout
//! and retries transient Asana failures. Whatever happens, the caller gets a
//! `ToolResult`: a failed call is data for the model, not an error for the
//! conversation loop.

use crate::config::RetryConfig;
use crate::core_types::ToolCall;
use crate::errors::{AsanaError, AssistantError};
use crate::tools::{ToolRegistry, ValidatedCall};
use futures_util::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

pub mod result;

pub use result::{ToolErrorKind, ToolOutcome, ToolPayload, ToolResult};

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            retry: RetryConfig::default(),
            call_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    /// Runs every call concurrently; results come back in request order.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.execute(call))).await
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let call_id = call.id.clone().unwrap_or_default();

        let validated = match self.registry.validate(call) {
            Ok(validated) => validated,
            Err(e) => {
                warn!("Rejected tool call '{}': {}", call.name, e);
                let message = match &e {
                    AssistantError::UnknownTool(name) => format!(
                        "Unknown tool '{}'. Available tools: {}",
                        name,
                        self.registry.names().join(", ")
                    ),
                    other => other.to_string(),
                };
                return ToolResult::error(
                    call_id,
                    call.name.clone(),
                    ToolErrorKind::InvalidRequest,
                    message,
                );
            }
        };

        self.run_with_retry(validated).await
    }

    async fn run_with_retry(&self, call: ValidatedCall) -> ToolResult {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(
                "Executing tool '{}' (attempt {}/{}) with {}",
                call.tool_name, attempt, max_attempts, call.arguments
            );

            let outcome = match tokio::time::timeout(
                self.call_timeout,
                call.tool.execute(call.arguments.clone()),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(AsanaError::Timeout),
            };

            match outcome {
                Ok(payload) => {
                    info!("Tool '{}' succeeded on attempt {}", call.tool_name, attempt);
                    return ToolResult::success(call.call_id, call.tool_name, payload);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let mut delay = self.retry.delay_for_attempt(attempt);
                    if let AsanaError::RateLimited {
                        retry_after: Some(retry_after),
                    } = &e
                    {
                        delay = delay.max((*retry_after).min(self.retry.max_backoff()));
                    }
                    warn!(
                        "Tool '{}' failed transiently (attempt {}/{}): {}. Retrying in {:?}",
                        call.tool_name, attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Tool '{}' failed: {}", call.tool_name, e);
                    let (kind, message) = Self::classify(&e, attempt);
                    return ToolResult::error(call.call_id, call.tool_name, kind, message);
                }
            }
        }
    }

    fn classify(error: &AsanaError, attempts: u32) -> (ToolErrorKind, String) {
        match error {
            e if e.is_transient() => (
                ToolErrorKind::TemporarilyUnavailable,
                format!(
                    "Asana is temporarily unavailable ({}); gave up after {} attempts",
                    e, attempts
                ),
            ),
            AsanaError::NotFound(_) => (ToolErrorKind::NotFound, error.to_string()),
            AsanaError::Unauthorized(_) => (ToolErrorKind::Unauthorized, error.to_string()),
            AsanaError::MissingScope(_) | AsanaError::InvalidRequest(_) => {
                (ToolErrorKind::InvalidRequest, error.to_string())
            }
            _ => (ToolErrorKind::Failed, error.to_string()),
        }
    }
}
