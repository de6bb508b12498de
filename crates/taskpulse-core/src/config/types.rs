//! Configuration type definitions for the assistant
//!
//! Every section carries defaults so a minimal YAML file only names the model
//! and the Asana scope. Credentials arrive here already resolved: the core
//! treats them as opaque values and never consults files or the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::errors::AssistantError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an Asana assistant that helps users get information about their \
Asana projects, tasks, and teams. You can look up projects, get task details, and generate \
reports and visualizations based on Asana data. When the user asks a question that requires \
data from Asana, use the available functions to get the data you need.\n\n\
Remember the following:\n\
1. Always fetch the specific information the user needs with the available functions.\n\
2. For analytics or reporting questions, prefer the reporting functions so the answer can be charted.\n\
3. Be conversational but concise in your responses.\n\
4. If a function reports an error, explain it plainly and suggest what the user can try next.\n\
5. When you are not sure which project, task, or user the user means, search for it or ask a clarifying question.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskpulseConfig {
    #[serde(default)]
    pub assistant: AssistantSettings,
    pub llm: LlmConfig,
    #[serde(default)]
    pub asana: AsanaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_context_budget_tokens")]
    pub context_budget_tokens: usize,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub busy_policy: BusyPolicy,
}

/// What happens when a query arrives while the session is mid-turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    #[default]
    Queue,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub auth: LlmAuth,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Custom {
        base_url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmAuth {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaConfig {
    #[serde(default = "default_asana_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth: AsanaAuth,
    #[serde(default)]
    pub portfolio_gid: Option<String>,
    #[serde(default)]
    pub team_gid: Option<String>,
    #[serde(default)]
    pub workspace_gid: Option<String>,
    #[serde(default = "default_asana_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AsanaAuth {
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_env: Option<String>,
}

/// Bounded exponential backoff shared by model calls and Asana queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: initial_backoff.as_millis() as u64,
            max_backoff_ms: max_backoff.as_millis() as u64,
        }
    }

    /// Wait before the attempt following `attempt` (1-based): initial * 2^(attempt-1), capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.initial_backoff_ms.saturating_mul(1_u64 << exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    fn validate(&self, section: &str) -> Result<(), AssistantError> {
        if self.max_attempts == 0 {
            return Err(AssistantError::ConfigError(format!(
                "{}.retry.max_attempts must be greater than 0",
                section
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(AssistantError::ConfigError(format!(
                "{}.retry.initial_backoff_ms cannot exceed max_backoff_ms",
                section
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            context_budget_tokens: default_context_budget_tokens(),
            system_prompt: default_system_prompt(),
            busy_policy: BusyPolicy::default(),
        }
    }
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for AsanaConfig {
    fn default() -> Self {
        Self {
            base_url: default_asana_base_url(),
            auth: AsanaAuth::default(),
            portfolio_gid: None,
            team_gid: None,
            workspace_gid: None,
            timeout_secs: default_asana_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_max_iterations() -> usize { 10 }
fn default_context_budget_tokens() -> usize { 12_000 }
fn default_system_prompt() -> String { DEFAULT_SYSTEM_PROMPT.to_string() }
fn default_llm_timeout_secs() -> u64 { 60 }
fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 1024 }
fn default_asana_base_url() -> String { "https://app.asana.com/api/1.0".to_string() }
fn default_asana_timeout_secs() -> u64 { 20 }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 8_000 }
fn default_log_level() -> String { "info".to_string() }

impl TaskpulseConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AssistantError> {
        if self.assistant.max_iterations == 0 {
            return Err(AssistantError::ConfigError(
                "assistant.max_iterations must be greater than 0".to_string(),
            ));
        }

        if self.assistant.context_budget_tokens == 0 {
            return Err(AssistantError::ConfigError(
                "assistant.context_budget_tokens must be greater than 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(AssistantError::ConfigError("LLM model cannot be empty".to_string()));
        }

        if let LlmProvider::Custom { base_url } = &self.llm.provider {
            if base_url.trim().is_empty() {
                return Err(AssistantError::ConfigError(
                    "Custom LLM provider requires a base_url".to_string(),
                ));
            }
        }

        if self.llm.timeout_secs == 0 || self.asana.timeout_secs == 0 {
            return Err(AssistantError::ConfigError(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.llm.retry.validate("llm")?;
        self.asana.retry.validate("asana")?;

        for (field, gid) in [
            ("portfolio_gid", &self.asana.portfolio_gid),
            ("team_gid", &self.asana.team_gid),
            ("workspace_gid", &self.asana.workspace_gid),
        ] {
            if let Some(gid) = gid {
                if gid.is_empty() || !gid.chars().all(|c| c.is_ascii_digit()) {
                    return Err(AssistantError::ConfigError(format!(
                        "asana.{} must be a numeric GID, got '{}'",
                        field, gid
                    )));
                }
            }
        }

        Ok(())
    }
}
