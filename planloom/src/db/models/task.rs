//! Per-plan-file row for a task/`PlanNode` (spec §3 "PlanNode", §6 `tasks`
//! table). This is the storage shape; `plan::PlanNode` is the richer,
//! deserialized in-memory type the rest of the crate works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub position: i64,
    pub path: String,
    pub depth: i64,
    pub name: String,
    pub instruction: Option<String>,
    pub metadata_json: String,
    pub status: String,
    pub execution_result_json: Option<String>,
    pub context_combined: Option<String>,
    pub context_sections_json: Option<String>,
    pub context_meta_json: Option<String>,
    pub context_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskDependencyRow {
    pub task_id: i64,
    pub depends_on: i64,
}
