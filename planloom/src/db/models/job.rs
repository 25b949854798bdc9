//! Job row (spec §3 "Job", §6 `jobs`/shared-store schemas).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    PlanDecompose,
    PlanExecute,
    ChatAction,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::PlanDecompose => "plan_decompose",
            JobType::PlanExecute => "plan_execute",
            JobType::ChatAction => "chat_action",
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan_decompose" => Ok(JobType::PlanDecompose),
            "plan_execute" => Ok(JobType::PlanExecute),
            "chat_action" => Ok(JobType::ChatAction),
            other => Err(format!("unknown job_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Typed job statistics (SPEC_FULL §3 addition): the free-form "stats" field
/// of spec §3 plus the two named counters the decomposer must report
/// (spec §4.4 step 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub llm_calls: u64,
    #[serde(default)]
    pub nodes_created: u64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub plan_id: Option<i64>,
    pub target_task_id: Option<i64>,
    pub session_id: Option<String>,
    pub parameters_json: String,
    pub result_json: Option<String>,
    pub stats_json: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
