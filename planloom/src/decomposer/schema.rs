//! The decomposition LLM's structured response contract (spec §4.4 step c).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSpec {
    pub name: String,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub leaf: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeResponse {
    pub target_node_id: String,
    pub mode: String,
    pub should_stop: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildSpec>,
}

/// Parse and lightly validate one LLM turn's JSON payload, stripping a
/// Markdown code fence if the model wrapped its answer in one (teacher's
/// `interpreter::parser` convention for LLM JSON extraction).
pub fn parse_response(raw: &str) -> Result<DecomposeResponse, serde_json::Error> {
    let trimmed = strip_code_fence(raw);
    serde_json::from_str(trimmed)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().trim_end_matches("```").trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().trim_end_matches("```").trim()
    } else {
        trimmed
    }
}
