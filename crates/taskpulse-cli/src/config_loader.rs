//! Configuration loader for YAML files and environment resolution
//!
//! The core receives credentials as plain values. This loader is where
//! `api_key_env` and `access_token_env` indirections are turned into them.

use std::env;
use std::path::Path;
use taskpulse_core::config::{AsanaAuth, LlmAuth, TaskpulseConfig};
use taskpulse_core::errors::AssistantError;
use tokio::fs;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<TaskpulseConfig, AssistantError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            AssistantError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse, resolve credentials and validate.
    pub fn from_str(content: &str) -> Result<TaskpulseConfig, AssistantError> {
        let mut config: TaskpulseConfig = serde_yaml::from_str(content)
            .map_err(|e| AssistantError::ConfigError(format!("Failed to parse YAML: {}", e)))?;

        Self::resolve_llm_auth(&mut config.llm.auth);
        Self::resolve_asana_auth(&mut config.asana.auth);

        config.validate()?;
        Ok(config)
    }

    fn resolve_llm_auth(auth: &mut LlmAuth) {
        if let Some(env_var) = &auth.api_key_env {
            if let Ok(api_key) = env::var(env_var) {
                auth.api_key = Some(api_key);
            }
        }

        if auth.api_key.is_none() && auth.api_key_env.is_none() {
            if let Ok(api_key) = env::var("OPENAI_API_KEY") {
                auth.api_key = Some(api_key);
            }
        }
    }

    fn resolve_asana_auth(auth: &mut AsanaAuth) {
        if let Some(env_var) = &auth.access_token_env {
            if let Ok(token) = env::var(env_var) {
                auth.access_token = Some(token);
            }
        }

        if auth.access_token.is_none() && auth.access_token_env.is_none() {
            if let Ok(token) = env::var("ASANA_ACCESS_TOKEN") {
                auth.access_token = Some(token);
            }
        }
    }
}
