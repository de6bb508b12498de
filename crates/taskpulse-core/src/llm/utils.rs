//! Composition of provider clients with the retry wrapper.

use crate::config::LlmConfig;
use crate::errors::AssistantError;
use crate::llm::{RetryingLLM, LLM};
use std::sync::Arc;
use std::time::Duration;

pub struct LLMFactory;

impl LLMFactory {
    /// Wraps any existing client with timeout and retry handling
    pub fn wrap_with_retry(llm: Arc<dyn LLM>, config: &LlmConfig) -> Arc<dyn LLM> {
        Arc::new(
            RetryingLLM::new(llm)
                .with_retry(config.retry.clone())
                .with_timeout(Duration::from_secs(config.timeout_secs)),
        )
    }

    /// Create an LLM client from configuration with all wrappers applied
    pub fn create_llm_with_config(config: &LlmConfig) -> Result<Arc<dyn LLM>, AssistantError> {
        let base_client = crate::llm::providers::create_llm_client(config)?;
        log::info!("Created LLM client for model {}", config.model);
        Ok(Self::wrap_with_retry(base_client, config))
    }
}
