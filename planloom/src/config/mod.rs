//! Environment-driven configuration (spec §6): three independent LLM
//! clients (conversation, decomposition, execution), data paths, web
//! search/graph-RAG provider selection, and job-log retention. Plain
//! `std::env::var` reads for the required keys, with `loader`'s teacher-style
//! YAML + `${ENV:default}` expansion kept for an optional overlay file.

pub mod error;
pub mod loader;

use crate::decomposer::DecomposerConfig;
use crate::executor::ExecutorConfig;
use error::{ConfigError, ConfigResult};
use planloom_llm::config::LlmConfig;
use serde::{Deserialize, Serialize};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

/// The conversation LLM uses the unprefixed keys (`PROVIDER`, `MODEL`,
/// `API_URL`, `API_KEY`) rather than a `<PREFIX>_` family, since it's the
/// primary client (spec §6).
fn conversation_llm_from_env() -> ConfigResult<LlmConfig> {
    let model = std::env::var("MODEL")
        .map_err(|_| ConfigError::Invalid("missing MODEL".to_string()))?;
    let api_url = std::env::var("API_URL")
        .map_err(|_| ConfigError::Invalid("missing API_URL".to_string()))?;
    let mut config = LlmConfig::new(env_or("PROVIDER", "openai-compatible"), model, api_url);
    config.api_key = std::env::var("API_KEY").ok();
    Ok(config)
}

/// Resolves the main registry path and the per-plan directory (`DB_ROOT`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub db_root: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            db_root: env_or("DB_ROOT", "./data"),
        }
    }

    pub fn registry_path(&self) -> String {
        format!("{}/registry.sqlite3", self.db_root)
    }

    pub fn plan_dir(&self) -> String {
        format!("{}/plans", self.db_root)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    pub default_provider: String,
    pub builtin_provider: String,
}

impl WebSearchConfig {
    pub fn from_env() -> Self {
        Self {
            default_provider: env_or("DEFAULT_WEB_SEARCH_PROVIDER", "builtin"),
            builtin_provider: env_or("BUILTIN_SEARCH_PROVIDER", "builtin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRagConfig {
    pub triples_path: Option<String>,
    pub cache_ttl_secs: u64,
}

impl GraphRagConfig {
    pub fn from_env() -> Self {
        Self {
            triples_path: std::env::var("GRAPH_RAG_TRIPLES_PATH").ok(),
            cache_ttl_secs: std::env::var("GRAPH_RAG_CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRetentionConfig {
    pub retention_days: u32,
    pub max_rows_per_job: u32,
}

impl JobRetentionConfig {
    pub fn from_env() -> Self {
        Self {
            retention_days: std::env::var("JOB_LOG_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_rows_per_job: std::env::var("JOB_LOG_MAX_ROWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        }
    }
}

/// Top-level configuration assembled from the environment (spec §6).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub conversation_llm: LlmConfig,
    pub decomposition_llm: LlmConfig,
    pub executor_llm: LlmConfig,
    pub decomposer: DecomposerConfig,
    pub executor: ExecutorConfig,
    pub auto_decompose_on_create: bool,
    pub web_search: WebSearchConfig,
    pub graph_rag: GraphRagConfig,
    pub job_retention: JobRetentionConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Loads every subsystem's configuration from the environment.
    /// The conversation LLM uses unprefixed keys (`PROVIDER`, `MODEL`,
    /// `API_URL`, `API_KEY`); decomposition and execution use `DECOMP_*`
    /// and `PLAN_EXECUTOR_*` respectively (spec §6).
    pub fn from_env() -> ConfigResult<Self> {
        let conversation_llm = conversation_llm_from_env()?;
        let decomposition_llm = LlmConfig::from_env_prefix("DECOMP").map_err(ConfigError::from)?;
        let executor_llm =
            LlmConfig::from_env_prefix("PLAN_EXECUTOR").map_err(ConfigError::from)?;

        let mut decomposer = DecomposerConfig::default();
        decomposer.apply_env_overrides();
        let mut executor = ExecutorConfig::default();
        executor.apply_env_overrides();

        Ok(Self {
            database: DatabaseConfig::from_env(),
            conversation_llm,
            decomposition_llm,
            executor_llm,
            decomposer,
            executor,
            auto_decompose_on_create: env_bool("DECOMP_AUTO_ON_CREATE", true),
            web_search: WebSearchConfig::from_env(),
            graph_rag: GraphRagConfig::from_env(),
            job_retention: JobRetentionConfig::from_env(),
            server: ServerConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_required_env() {
        std::env::set_var("PROVIDER", "openai-compatible");
        std::env::set_var("MODEL", "gpt-4o-mini");
        std::env::set_var("API_URL", "http://localhost:11434/v1");
        std::env::set_var("DECOMP_MODEL", "gpt-4o-mini");
        std::env::set_var("DECOMP_API_URL", "http://localhost:11434/v1");
        std::env::set_var("PLAN_EXECUTOR_MODEL", "gpt-4o-mini");
        std::env::set_var("PLAN_EXECUTOR_API_URL", "http://localhost:11434/v1");
    }

    #[test]
    fn from_env_loads_three_independent_llm_clients() {
        set_required_env();
        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.conversation_llm.model, "gpt-4o-mini");
        assert_eq!(config.decomposition_llm.model, "gpt-4o-mini");
        assert_eq!(config.executor_llm.model, "gpt-4o-mini");
    }

    #[test]
    fn database_config_derives_registry_and_plan_paths() {
        std::env::set_var("DB_ROOT", "/tmp/planloom-test-root");
        let db = DatabaseConfig::from_env();
        assert_eq!(db.registry_path(), "/tmp/planloom-test-root/registry.sqlite3");
        assert_eq!(db.plan_dir(), "/tmp/planloom-test-root/plans");
        std::env::remove_var("DB_ROOT");
    }

    #[test]
    fn missing_decomp_model_is_an_error() {
        std::env::remove_var("DECOMP_MODEL");
        std::env::remove_var("DECOMP_API_URL");
        assert!(LlmConfig::from_env_prefix("DECOMP").is_err());
    }
}
