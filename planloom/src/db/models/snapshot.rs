//! Plan-tree snapshot row (spec §3 "Non-goals: undo/redo beyond simple
//! snapshots", §6 `snapshots(id, note, snapshot_json, created_at)`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub note: Option<String>,
    pub snapshot_json: String,
    pub created_at: DateTime<Utc>,
}
