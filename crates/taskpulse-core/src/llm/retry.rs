//! Timeout and retry wrapper for language model calls
//!
//! Every call is bounded by a timeout. Timeouts, rate limits and server-side
//! failures are retried with exponential backoff; once the attempts are spent
//! the call fails with `ModelUnavailable`. Anything else (bad requests,
//! unparseable payloads) is returned untouched on the first failure.
//!
//! A streamed call gets the same bound between consecutive chunks. A stream
//! that goes quiet for longer ends with `StreamInterrupted`.

use crate::config::RetryConfig;
use crate::core_types::{LLMResponse, Message};
use crate::errors::AssistantError;
use crate::llm::{LLMStream, ToolMetadata, LLM};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RetryingLLM {
    inner: Arc<dyn LLM>,
    retry: RetryConfig,
    timeout: Duration,
}

impl RetryingLLM {
    pub fn new(inner: Arc<dyn LLM>) -> Self {
        Self {
            inner,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rate limits, server-side failures, transport errors and timeouts are
    /// worth another attempt. Other HTTP statuses are the caller's fault.
    fn is_transient_error(error: &AssistantError) -> bool {
        match error {
            AssistantError::ModelHttp { status, .. } => *status == 429 || *status >= 500,
            AssistantError::ModelTransport(_) | AssistantError::ModelUnavailable(_) => true,
            _ => false,
        }
    }

    async fn call_with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, AssistantError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, AssistantError>> + Send,
        T: Send,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AssistantError::ModelTransport(format!(
                    "model call timed out after {}s",
                    self.timeout.as_secs_f32()
                ))),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Model call succeeded on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Err(e) if Self::is_transient_error(&e) => {
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(
                            "Model call failed (attempt {}/{}): {}. Retrying in {:?}",
                            attempt, max_attempts, e, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!("Model unavailable after {} attempts: {}", max_attempts, last_error);
        Err(AssistantError::ModelUnavailable(format!(
            "no response after {} attempts: {}",
            max_attempts, last_error
        )))
    }
}

#[async_trait]
impl LLM for RetryingLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AssistantError> {
        self.call_with_retry(|| self.inner.generate(messages.clone(), tools.clone()))
            .await
    }

    /// Retries establishing the stream. Failures after the first chunk are
    /// reported in the stream itself.
    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMStream, AssistantError> {
        let stream = self
            .call_with_retry(|| self.inner.generate_stream(messages.clone(), tools.clone()))
            .await?;
        Ok(bounded_stream(stream, self.timeout))
    }
}

/// Ends the stream with `StreamInterrupted` once no chunk arrives within `idle`.
fn bounded_stream(mut inner: LLMStream, idle: Duration) -> LLMStream {
    Box::pin(async_stream::stream! {
        loop {
            match tokio::time::timeout(idle, inner.next()).await {
                Ok(Some(chunk)) => yield chunk,
                Ok(None) => break,
                Err(_) => {
                    warn!("Model stream produced nothing for {:?}; giving up", idle);
                    yield Err(AssistantError::StreamInterrupted(format!(
                        "no model output for {}s",
                        idle.as_secs_f32()
                    )));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::LLMStreamChunk;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyLLM {
        calls: AtomicUsize,
        failures: usize,
        error: AssistantError,
        delay: Option<Duration>,
    }

    impl FlakyLLM {
        fn new(failures: usize, error: AssistantError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                error,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl LLM for FlakyLLM {
        async fn generate(
            &self,
            _messages: Vec<Message>,
            _tools: Option<Vec<ToolMetadata>>,
        ) -> Result<LLMResponse, AssistantError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                if call < self.failures {
                    tokio::time::sleep(delay).await;
                }
            }
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(LLMResponse::text("done"))
            }
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let flaky = Arc::new(FlakyLLM::new(
            2,
            AssistantError::ModelHttp {
                status: 429,
                message: "Too Many Requests".to_string(),
            },
        ));
        let llm = RetryingLLM::new(flaky.clone()).with_retry(fast_retry(3));

        let response = llm.generate(vec![Message::user("hi")], None).await.expect("retried");
        assert_eq!(response.content.as_deref(), Some("done"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_model_unavailable() {
        let flaky = Arc::new(FlakyLLM::new(
            10,
            AssistantError::ModelHttp {
                status: 503,
                message: "Service Unavailable".to_string(),
            },
        ));
        let llm = RetryingLLM::new(flaky.clone()).with_retry(fast_retry(3));

        let err = llm.generate(vec![Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, AssistantError::ModelUnavailable(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let flaky = Arc::new(FlakyLLM::new(
            10,
            AssistantError::ParsingError("Invalid JSON response".to_string()),
        ));
        let llm = RetryingLLM::new(flaky.clone()).with_retry(fast_retry(3));

        let err = llm.generate(vec![Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, AssistantError::ParsingError(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_error_status_is_not_retried() {
        let flaky = Arc::new(FlakyLLM::new(
            10,
            AssistantError::ModelHttp {
                status: 400,
                message: "max_tokens must be <= 500".to_string(),
            },
        ));
        let llm = RetryingLLM::new(flaky.clone()).with_retry(fast_retry(3));

        let err = llm.generate(vec![Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, AssistantError::ModelHttp { status: 400, .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let mut flaky = FlakyLLM::new(1, AssistantError::InternalError("unused".to_string()));
        flaky.delay = Some(Duration::from_millis(200));
        let flaky = Arc::new(flaky);
        let llm = RetryingLLM::new(flaky.clone())
            .with_retry(fast_retry(2))
            .with_timeout(Duration::from_millis(20));

        let response = llm.generate(vec![Message::user("hi")], None).await.expect("second attempt");
        assert_eq!(response.content.as_deref(), Some("done"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    struct StallingLLM;

    #[async_trait]
    impl LLM for StallingLLM {
        async fn generate(
            &self,
            _messages: Vec<Message>,
            _tools: Option<Vec<ToolMetadata>>,
        ) -> Result<LLMResponse, AssistantError> {
            futures_util::future::pending().await
        }

        async fn generate_stream(
            &self,
            _messages: Vec<Message>,
            _tools: Option<Vec<ToolMetadata>>,
        ) -> Result<LLMStream, AssistantError> {
            let first = futures_util::stream::iter(vec![Ok(LLMStreamChunk::TextDelta("Hello ".to_string()))]);
            Ok(Box::pin(first.chain(futures_util::stream::pending())))
        }
    }

    #[tokio::test]
    async fn test_stalled_stream_ends_with_interruption() {
        let llm = RetryingLLM::new(Arc::new(StallingLLM))
            .with_retry(fast_retry(2))
            .with_timeout(Duration::from_millis(50));

        let stream = llm
            .generate_stream(vec![Message::user("hi")], None)
            .await
            .expect("stream opens");
        let chunks: Vec<_> = tokio::time::timeout(Duration::from_secs(2), stream.collect::<Vec<_>>())
            .await
            .expect("stream ends");

        assert_eq!(chunks.len(), 2);
        assert!(matches!(&chunks[0], Ok(LLMStreamChunk::TextDelta(t)) if t == "Hello "));
        assert!(matches!(chunks[1], Err(AssistantError::StreamInterrupted(_))));
    }
}
