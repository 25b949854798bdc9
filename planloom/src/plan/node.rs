//! `PlanNode` — a task in a plan tree (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanNodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl PlanNodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanNodeStatus::Pending => "pending",
            PlanNodeStatus::Running => "running",
            PlanNodeStatus::Completed => "completed",
            PlanNodeStatus::Failed => "failed",
            PlanNodeStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanNodeStatus::Completed | PlanNodeStatus::Failed | PlanNodeStatus::Skipped
        )
    }
}

impl std::str::FromStr for PlanNodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PlanNodeStatus::Pending),
            "running" => Ok(PlanNodeStatus::Running),
            "completed" => Ok(PlanNodeStatus::Completed),
            "failed" => Ok(PlanNodeStatus::Failed),
            "skipped" => Ok(PlanNodeStatus::Skipped),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Structured execution output (spec §3 `execution_result`), plus a
/// `duration_ms` bookkeeping field (SPEC_FULL §3 addition) the executor
/// fills in from its own `mark_running`/finalize timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// One section of a node's retrieved context (spec §3 `context_sections`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    pub title: String,
    pub content: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub position: i64,
    pub depth: i64,
    pub path: String,
    pub name: String,
    pub instruction: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub status: PlanNodeStatus,
    pub execution_result: Option<ExecutionResult>,
    pub context_combined: Option<String>,
    #[serde(default)]
    pub context_sections: Vec<ContextSection>,
    pub context_meta: Option<serde_json::Value>,
    pub context_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dependencies: BTreeSet<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanNode {
    pub fn new_child(id: i64, parent_id: Option<i64>, position: i64, depth: i64, path: String, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            parent_id,
            position,
            depth,
            path,
            name: name.into(),
            instruction: None,
            metadata: serde_json::json!({}),
            status: PlanNodeStatus::Pending,
            execution_result: None,
            context_combined: None,
            context_sections: Vec::new(),
            context_meta: None,
            context_updated_at: None,
            dependencies: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
