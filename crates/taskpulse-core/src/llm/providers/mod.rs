//! LLM provider implementations
//!
//! Both supported provider kinds speak the OpenAI chat-completions protocol;
//! a custom provider only swaps the base URL.

use std::sync::Arc;
use crate::config::{LlmConfig, LlmProvider};
use crate::llm::LLM;
use crate::errors::AssistantError;

pub mod openai;

pub use openai::OpenAIClient;

/// Create an LLM client based on the provider configuration
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, AssistantError> {
    match &config.provider {
        LlmProvider::OpenAI => openai::create_client(config, None),
        LlmProvider::Custom { base_url } => openai::create_client(config, Some(base_url)),
    }
}
