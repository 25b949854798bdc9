//! Configuration for a chat-model boundary.
//!
//! One [`LlmConfig`] is constructed per subsystem (conversation, decomposition,
//! executor) — spec §6 requires each to be independently configurable so that
//! decomposition or execution can use a cheaper or more deterministic model
//! than the conversation LLM.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    3
}

/// Provider/model/endpoint configuration for a single chat-model client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Free-form provider identifier (e.g. "openai", "anthropic", "ollama").
    /// `planloom-llm` does not branch on this value; it only shapes logging
    /// and is forwarded as metadata.
    pub provider: String,
    pub model: String,
    pub api_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_url: api_url.into(),
            api_key: None,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build a config from a family of environment variables sharing a
    /// `prefix`, e.g. `prefix = "DECOMP"` reads `DECOMP_PROVIDER`,
    /// `DECOMP_MODEL`, `DECOMP_API_URL`, `DECOMP_API_KEY` (spec §6).
    pub fn from_env_prefix(prefix: &str) -> Result<Self> {
        let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}"));

        let provider = var("PROVIDER").unwrap_or_else(|_| "openai-compatible".to_string());
        let model = var("MODEL")
            .map_err(|_| LlmError::ConfigError(format!("missing {prefix}_MODEL")))?;
        let api_url = var("API_URL")
            .map_err(|_| LlmError::ConfigError(format!("missing {prefix}_API_URL")))?;
        let api_key = var("API_KEY").ok();

        let mut config = Self::new(provider, model, api_url);
        config.api_key = api_key;
        Ok(config)
    }
}
