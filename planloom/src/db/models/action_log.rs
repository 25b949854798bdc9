//! Append-only action log row (spec §3 "ActionLog", §6 `plan_action_logs`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionLogRow {
    pub id: i64,
    pub plan_id: Option<i64>,
    pub job_id: String,
    pub session_id: Option<String>,
    pub action_kind: String,
    pub action_name: String,
    pub status: String,
    pub success: bool,
    pub message: Option<String>,
    pub details_json: Option<String>,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
