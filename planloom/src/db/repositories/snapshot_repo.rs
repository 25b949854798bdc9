//! Per-plan-file snapshot CRUD (spec §4.2 `upsert_plan_tree(tree, note?)`):
//! an opportunistic full-tree dump, keyed by a caller-supplied note, with no
//! automatic pruning (spec §9 Open Question "snapshot retention policy").

use crate::db::connection::DatabasePool;
use crate::db::models::SnapshotRow;
use chrono::Utc;

pub struct SnapshotRepository;

impl SnapshotRepository {
    pub async fn insert(pool: &DatabasePool, note: Option<&str>, snapshot_json: &str) -> Result<SnapshotRow, sqlx::Error> {
        sqlx::query_as::<_, SnapshotRow>(
            "INSERT INTO snapshots (note, snapshot_json, created_at) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(note)
        .bind(snapshot_json)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &DatabasePool) -> Result<Vec<SnapshotRow>, sqlx::Error> {
        sqlx::query_as::<_, SnapshotRow>("SELECT * FROM snapshots ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }
}
