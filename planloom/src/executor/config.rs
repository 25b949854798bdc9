//! Plan Executor configuration (C5, spec §4.5): generation and retry
//! parameters for the execution loop. Provider/model/endpoint selection
//! lives in `planloom_llm::LlmConfig` instead — spec §6 wires each
//! subsystem (conversation, decomposition, execution) to its own LLM client,
//! so this config only covers what the execution loop itself controls.

use crate::executor::error::{ExecutorError, ExecutorResult};
use crate::executor::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::env;

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> Option<usize> {
    Some(2048)
}

fn default_use_context() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    120
}

/// Configuration for the dependency-ordered execution loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Temperature for the executor LLM (low by default: execution should be
    /// deterministic, unlike the conversational LLM).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<usize>,

    #[serde(default)]
    pub retry: RetryConfig,

    /// System prompt override; falls back to a built-in default.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Whether to include ancestor/dependency context in the execution
    /// prompt (spec §4.5 "build the execution prompt (node instruction,
    /// ancestor context, dependency outputs)").
    #[serde(default = "default_use_context")]
    pub use_context: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_per_task_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry: RetryConfig::default(),
            system_prompt: None,
            use_context: default_use_context(),
            timeout_per_task_secs: default_timeout_secs(),
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_use_context(mut self, enabled: bool) -> Self {
        self.use_context = enabled;
        self
    }

    pub fn with_timeout_per_task_secs(mut self, secs: u64) -> Self {
        self.timeout_per_task_secs = secs;
        self
    }

    pub fn validate(&self) -> ExecutorResult<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ExecutorError::ParseError(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            )));
        }
        if let Some(tokens) = self.max_tokens {
            if tokens == 0 {
                return Err(ExecutorError::ParseError("max_tokens must be greater than 0".to_string()));
            }
        }
        if self.timeout_per_task_secs == 0 {
            return Err(ExecutorError::ParseError("timeout_per_task_secs must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Environment variables: `PLAN_EXECUTOR_TEMPERATURE`,
    /// `PLAN_EXECUTOR_MAX_TOKENS`, `PLAN_EXECUTOR_MAX_RETRIES`,
    /// `PLAN_EXECUTOR_TIMEOUT`, `PLAN_EXECUTOR_USE_CONTEXT` (spec §6
    /// environment configuration table).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(temp) = env::var("PLAN_EXECUTOR_TEMPERATURE") {
            if let Ok(value) = temp.parse::<f32>() {
                self.temperature = value.clamp(0.0, 1.0);
            }
        }
        if let Ok(tokens) = env::var("PLAN_EXECUTOR_MAX_TOKENS") {
            if let Ok(value) = tokens.parse::<usize>() {
                self.max_tokens = Some(value);
            }
        }
        if let Ok(retries) = env::var("PLAN_EXECUTOR_MAX_RETRIES") {
            if let Ok(value) = retries.parse::<u32>() {
                self.retry.max_retries = value;
            }
        }
        if let Ok(secs) = env::var("PLAN_EXECUTOR_TIMEOUT") {
            if let Ok(value) = secs.parse::<u64>() {
                self.timeout_per_task_secs = value;
            }
        }
        if let Ok(use_context) = env::var("PLAN_EXECUTOR_USE_CONTEXT") {
            self.use_context = use_context.eq_ignore_ascii_case("true") || use_context == "1";
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ExecutorConfig::default();
        assert_eq!(config.temperature, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods_compose() {
        let config = ExecutorConfig::new()
            .with_temperature(0.5)
            .with_max_tokens(1024)
            .with_use_context(false);
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, Some(1024));
        assert!(!config.use_context);
    }

    #[test]
    fn temperature_clamps_into_range() {
        assert_eq!(ExecutorConfig::new().with_temperature(1.5).temperature, 1.0);
        assert_eq!(ExecutorConfig::new().with_temperature(-0.5).temperature, 0.0);
    }

    #[test]
    fn validate_rejects_zero_max_tokens() {
        let config = ExecutorConfig::new().with_max_tokens(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        env::set_var("PLANLOOM_EXEC_TEMPERATURE", "0.9");
        env::set_var("PLANLOOM_EXEC_MAX_RETRIES", "7");
        let config = ExecutorConfig::from_env();
        assert_eq!(config.temperature, 0.9);
        assert_eq!(config.retry.max_retries, 7);
        env::remove_var("PLANLOOM_EXEC_TEMPERATURE");
        env::remove_var("PLANLOOM_EXEC_MAX_RETRIES");
    }
}
