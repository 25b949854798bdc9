//! Tool invocation boundary (spec §4.6 step 4, §1/§6: `web_search` and
//! `graph_rag` are named external collaborators). `planloom` ships no
//! concrete provider, only the trait, the normalisation/redaction shape
//! around whatever a real invoker returns, and a `NullToolInvoker` for tests.

use crate::jobs::redact::redact;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("tool invocation failed: {0}")]
    Failed(String),
}

/// Normalised tool result (spec §4.6 step 4: "the normalised result
/// `{name, summary, parameters, result}`").
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub name: String,
    pub summary: String,
    pub parameters: serde_json::Value,
    pub result: serde_json::Value,
    /// Set when a builtin provider failed over to an external one (spec §7
    /// "ToolFailure": "the builtin provider falls back to the external
    /// provider automatically, setting `fallback_from`").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<String>,
}

impl ToolResult {
    /// Redact the result payload before it is logged (spec §9 "Redaction of
    /// action details").
    pub fn redacted_result(&self) -> serde_json::Value {
        redact(&self.result)
    }
}

/// The trait boundary for every tool operation (spec §4.6 step 4).
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, name: &str, parameters: serde_json::Value) -> Result<ToolResult, ToolError>;
}

/// A no-op invoker used in tests and as the default when no provider is
/// configured; every call fails with `ToolError::NotFound` so callers see an
/// explicit, unambiguous failure rather than a fabricated result.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullToolInvoker;

#[async_trait]
impl ToolInvoker for NullToolInvoker {
    async fn invoke(&self, name: &str, _parameters: serde_json::Value) -> Result<ToolResult, ToolError> {
        Err(ToolError::NotFound(format!("no tool provider configured for '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_invoker_always_fails() {
        let invoker = NullToolInvoker;
        let result = invoker.invoke("web_search", serde_json::json!({"query": "x"})).await;
        assert!(result.is_err());
    }
}
