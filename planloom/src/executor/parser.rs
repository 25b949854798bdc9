//! Executor LLM response parser (spec §4.5 step 2: the model returns
//! `{status, content, notes, metadata}`, which we translate into a
//! `PlanNodeStatus` plus a persisted `ExecutionResult`).

use crate::executor::error::{ExecutorError, ExecutorResult};
use crate::plan::node::{ExecutionResult, PlanNodeStatus};
use serde_json::Value;
use tracing::{debug, warn};

/// Parser for executor LLM responses.
pub struct ResponseParser {
    /// When true, a response with no valid JSON is rejected outright instead
    /// of falling back to heuristic text parsing.
    strict_mode: bool,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self { strict_mode: false }
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    /// Parse a raw LLM response into the status it resolves to plus the
    /// `ExecutionResult` to persist.
    pub fn parse(&self, response: &str) -> ExecutorResult<(PlanNodeStatus, ExecutionResult)> {
        debug!(response, "parsing executor response");

        if let Some(json_str) = Self::extract_json(response) {
            match self.parse_json(json_str) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    if self.strict_mode {
                        return Err(e);
                    }
                    warn!(error = %e, "executor JSON parsing failed, falling back to text parsing");
                }
            }
        } else if self.strict_mode {
            return Err(ExecutorError::ParseError("strict mode enabled but no JSON found in response".to_string()));
        }

        self.parse_text(response)
    }

    fn parse_json(&self, json_str: &str) -> ExecutorResult<(PlanNodeStatus, ExecutionResult)> {
        let value: Value =
            serde_json::from_str(json_str).map_err(|e| ExecutorError::ParseError(format!("invalid JSON: {e}")))?;
        let obj = value
            .as_object()
            .ok_or_else(|| ExecutorError::ParseError("response JSON is not an object".to_string()))?;

        let status_str = obj
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExecutorError::ParseError("missing 'status' field".to_string()))?;

        let node_status = match status_str.to_lowercase().as_str() {
            "completed" | "complete" | "success" | "done" => PlanNodeStatus::Completed,
            "failed" | "fail" | "error" => PlanNodeStatus::Failed,
            "skipped" | "skip" => PlanNodeStatus::Skipped,
            other => return Err(ExecutorError::ParseError(format!("unknown execution status: {other}"))),
        };

        let content = obj.get("content").and_then(|v| v.as_str()).map(str::to_string);
        let notes = obj.get("notes").and_then(|v| v.as_str()).map(str::to_string);
        let metadata = obj.get("metadata").cloned().unwrap_or_else(|| serde_json::json!({}));

        Ok((
            node_status,
            ExecutionResult {
                status: status_str.to_string(),
                content,
                notes,
                metadata,
                duration_ms: None,
            },
        ))
    }

    /// Heuristic fallback for models that ignore the JSON instruction.
    fn parse_text(&self, text: &str) -> ExecutorResult<(PlanNodeStatus, ExecutionResult)> {
        if text.trim().is_empty() {
            return Err(ExecutorError::ParseError("empty executor response".to_string()));
        }

        let text_lower = text.to_lowercase();
        let status = if text_lower.contains("failed") || text_lower.contains("error") {
            PlanNodeStatus::Failed
        } else {
            PlanNodeStatus::Completed
        };

        Ok((
            status,
            ExecutionResult {
                status: status.as_str().to_string(),
                content: Some(text.trim().to_string()),
                notes: None,
                metadata: serde_json::json!({}),
                duration_ms: None,
            },
        ))
    }

    /// Extract JSON from a text response: a ```json fenced block, or the
    /// outermost `{...}` span.
    fn extract_json(text: &str) -> Option<&str> {
        if let Some(start) = text.find("```json") {
            let content = &text[start + 7..];
            if let Some(end) = content.find("```") {
                return Some(content[..end].trim());
            }
        }
        if let Some(start) = text.find("```") {
            let content = &text[start + 3..];
            if let Some(end) = content.find("```") {
                let candidate = content[..end].trim();
                if candidate.starts_with('{') {
                    return Some(candidate);
                }
            }
        }
        if let Some(start) = text.find('{') {
            if let Some(end) = text.rfind('}') {
                if end > start {
                    return Some(text[start..=end].trim());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completed_json() {
        let parser = ResponseParser::new();
        let (status, result) = parser
            .parse(r#"{"status":"completed","content":"done","notes":"ok"}"#)
            .unwrap();
        assert_eq!(status, PlanNodeStatus::Completed);
        assert_eq!(result.content.as_deref(), Some("done"));
    }

    #[test]
    fn parses_failed_json_in_code_fence() {
        let parser = ResponseParser::new();
        let text = "Here you go:\n```json\n{\"status\":\"failed\",\"notes\":\"missing input\"}\n```";
        let (status, result) = parser.parse(text).unwrap();
        assert_eq!(status, PlanNodeStatus::Failed);
        assert_eq!(result.notes.as_deref(), Some("missing input"));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let parser = ResponseParser::new().with_strict_mode(true);
        assert!(parser.parse(r#"{"status":"paused"}"#).is_err());
    }

    #[test]
    fn strict_mode_rejects_non_json() {
        let parser = ResponseParser::new().with_strict_mode(true);
        assert!(parser.parse("just some prose").is_err());
    }

    #[test]
    fn falls_back_to_text_heuristics() {
        let parser = ResponseParser::new();
        let (status, _) = parser.parse("The task completed successfully.").unwrap();
        assert_eq!(status, PlanNodeStatus::Completed);
    }

    #[test]
    fn empty_response_is_rejected() {
        let parser = ResponseParser::new();
        assert!(parser.parse("").is_err());
    }
}
