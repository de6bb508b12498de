//! Assistant factory for creating configured assistants from TaskpulseConfig

use crate::asana::{AsanaApi, AsanaHttpClient, AsanaScope};
use crate::assistant::Assistant;
use crate::config::TaskpulseConfig;
use crate::errors::AssistantError;
use crate::executor::ToolExecutor;
use crate::llm::{utils::LLMFactory, LLM};
use crate::tools::{ToolContext, ToolFactory};
use std::sync::Arc;
use std::time::Duration;

/// Factory for creating configured assistants from TaskpulseConfig
pub struct AssistantFactory;

impl AssistantFactory {
    /// Wires the model client, the Asana REST client and the tool set.
    ///
    /// Credentials must already be resolved into the config.
    pub fn create_from_config(config: &TaskpulseConfig) -> Result<Assistant, AssistantError> {
        config.validate()?;
        let llm = LLMFactory::create_llm_with_config(&config.llm)?;
        let asana = AsanaHttpClient::from_config(&config.asana)?;
        Self::create_with_components(config, llm, Arc::new(asana))
    }

    /// Builds an assistant around caller-supplied model and Asana clients.
    pub fn create_with_components(
        config: &TaskpulseConfig,
        llm: Arc<dyn LLM>,
        asana: Arc<dyn AsanaApi>,
    ) -> Result<Assistant, AssistantError> {
        let scope = Self::configure_scope(config);
        let registry = ToolFactory::create_asana_registry(ToolContext::new(asana, scope))?;

        let executor = ToolExecutor::new(Arc::new(registry))
            .with_retry(config.asana.retry.clone())
            .with_call_timeout(Duration::from_secs(config.asana.timeout_secs));

        log::info!(
            "Assistant ready: model {}, {} max iterations, {} token budget",
            config.llm.model,
            config.assistant.max_iterations,
            config.assistant.context_budget_tokens
        );
        Ok(Assistant::new(llm, executor, &config.assistant))
    }

    fn configure_scope(config: &TaskpulseConfig) -> AsanaScope {
        AsanaScope {
            portfolio_gid: config.asana.portfolio_gid.clone(),
            team_gid: config.asana.team_gid.clone(),
            workspace_gid: config.asana.workspace_gid.clone(),
        }
    }
}
