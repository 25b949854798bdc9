//! LLM structured-response schema (spec §4.6 step 2): the JSON protocol
//! between the conversation LLM and the agent.

use crate::agent::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PlanOperation,
    TaskOperation,
    ContextRequest,
    SystemOperation,
    ToolOperation,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::PlanOperation => "plan_operation",
            ActionKind::TaskOperation => "task_operation",
            ActionKind::ContextRequest => "context_request",
            ActionKind::SystemOperation => "system_operation",
            ActionKind::ToolOperation => "tool_operation",
        }
    }
}

fn default_blocking() -> bool {
    true
}

fn default_parameters() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: i64,
    pub backoff_sec: f64,
}

/// One structured instruction emitted by the LLM in a chat turn (spec §4.6
/// step 2 JSON schema, §GLOSSARY "Action").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    pub kind: ActionKind,
    pub name: String,
    #[serde(default = "default_parameters")]
    pub parameters: serde_json::Value,
    #[serde(default = "default_blocking")]
    pub blocking: bool,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmReply {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmStructuredResponse {
    pub llm_reply: LlmReply,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// The server-side record of one action's execution (spec §GLOSSARY "AgentStep").
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub kind: ActionKind,
    pub name: String,
    pub parameters: serde_json::Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Strip a ```json fenced wrapper, or a bare ``` fence, around a JSON body
/// (spec §4.6 step 2: "raw text is stripped of any code-fence wrapping").
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        return rest.trim().trim_end_matches("```").trim();
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        return rest.trim().trim_end_matches("```").trim();
    }
    trimmed
}

/// Best-effort extraction of `llm_reply.message` from a raw reply that
/// failed strict parsing (spec §4.6 step 2: "if parsing fails, the agent
/// returns `llm_reply.message` as the user-facing text and no actions").
pub fn extract_raw_message(raw: &str) -> Option<String> {
    let stripped = strip_code_fence(raw);
    let value: serde_json::Value = serde_json::from_str(stripped).ok()?;
    value.get("llm_reply")?.get("message")?.as_str().map(str::to_string)
}

/// Parse and validate a raw LLM reply against the structured-response schema
/// (spec §4.6 step 2, §7 "ValidationError", §8 properties 7–8).
pub fn parse_response(raw: &str) -> AgentResult<LlmStructuredResponse> {
    let stripped = strip_code_fence(raw);
    let response: LlmStructuredResponse = serde_json::from_str(stripped)
        .map_err(|e| AgentError::ValidationError(format!("malformed structured response: {e}")))?;

    for action in &response.actions {
        if action.order < 1 {
            return Err(AgentError::ValidationError(format!(
                "action '{}' has order {} (must be >= 1)",
                action.name, action.order
            )));
        }
        if !action.parameters.is_object() {
            return Err(AgentError::ValidationError(format!(
                "action '{}' parameters must be an object",
                action.name
            )));
        }
    }

    let has_subgraph_request = response
        .actions
        .iter()
        .any(|a| a.kind == ActionKind::ContextRequest && a.name == "request_subgraph");
    if has_subgraph_request && response.actions.len() > 1 {
        return Err(AgentError::ValidationError(
            "request_subgraph must be the sole action in a turn".to_string(),
        ));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_response() {
        let raw = r#"{"llm_reply":{"message":"ok"},"actions":[{"kind":"plan_operation","name":"list_plans","parameters":{},"order":1}]}"#;
        let response = parse_response(raw).unwrap();
        assert_eq!(response.actions.len(), 1);
        assert!(response.actions[0].blocking);
    }

    #[test]
    fn strips_code_fence() {
        let raw = "```json\n{\"llm_reply\":{\"message\":\"hi\"},\"actions\":[]}\n```";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.llm_reply.message, "hi");
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let raw = r#"{"llm_reply":{"message":"hi"},"actions":[],"extra":true}"#;
        assert!(parse_response(raw).is_err());
    }

    #[test]
    fn rejects_zero_order() {
        let raw = r#"{"llm_reply":{"message":"hi"},"actions":[{"kind":"system_operation","name":"help","parameters":{},"order":0}]}"#;
        assert!(parse_response(raw).is_err());
    }

    #[test]
    fn request_subgraph_must_be_sole_action() {
        let raw = r#"{"llm_reply":{"message":"hi"},"actions":[
            {"kind":"context_request","name":"request_subgraph","parameters":{},"order":1},
            {"kind":"system_operation","name":"help","parameters":{},"order":2}
        ]}"#;
        assert!(parse_response(raw).is_err());
    }
}
