//! Job log / action log repository (spec §4.3 `append_log`/`append_action_log`).
//! Sequences are per-job and strictly monotonic (spec §8 property 15):
//! `next_sequence` and the insert happen under the caller's per-job lock
//! (see `crate::jobs::manager::JobManager`), so no additional locking is
//! needed here.

use crate::db::connection::DatabasePool;
use crate::db::models::{ActionLogRow, JobLogRow};
use chrono::Utc;

pub struct LogRepository;

impl LogRepository {
    pub async fn next_log_sequence(pool: &DatabasePool, job_id: &str) -> Result<i64, sqlx::Error> {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(sequence) FROM plan_job_logs WHERE job_id = ?")
                .bind(job_id)
                .fetch_one(pool)
                .await?;
        Ok(max.unwrap_or(0) + 1)
    }

    pub async fn append_log(
        pool: &DatabasePool,
        job_id: &str,
        sequence: i64,
        level: &str,
        message: &str,
        metadata_json: Option<&str>,
    ) -> Result<JobLogRow, sqlx::Error> {
        sqlx::query_as::<_, JobLogRow>(
            "INSERT INTO plan_job_logs (job_id, sequence, timestamp, level, message, metadata_json)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(job_id)
        .bind(sequence)
        .bind(Utc::now())
        .bind(level)
        .bind(message)
        .bind(metadata_json)
        .fetch_one(pool)
        .await
    }

    pub async fn logs_since(
        pool: &DatabasePool,
        job_id: &str,
        cursor: i64,
    ) -> Result<Vec<JobLogRow>, sqlx::Error> {
        sqlx::query_as::<_, JobLogRow>(
            "SELECT * FROM plan_job_logs WHERE job_id = ? AND sequence > ? ORDER BY sequence",
        )
        .bind(job_id)
        .bind(cursor)
        .fetch_all(pool)
        .await
    }

    pub async fn next_action_sequence(pool: &DatabasePool, job_id: &str) -> Result<i64, sqlx::Error> {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(sequence) FROM plan_action_logs WHERE job_id = ?")
                .bind(job_id)
                .fetch_one(pool)
                .await?;
        Ok(max.unwrap_or(0) + 1)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn append_action_log(
        pool: &DatabasePool,
        plan_id: Option<i64>,
        job_id: &str,
        session_id: Option<&str>,
        sequence: i64,
        action_kind: &str,
        action_name: &str,
        status: &str,
        success: bool,
        message: Option<&str>,
        details_json: Option<&str>,
    ) -> Result<ActionLogRow, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, ActionLogRow>(
            "INSERT INTO plan_action_logs
                (plan_id, job_id, session_id, action_kind, action_name, status, success, message,
                 details_json, sequence, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(plan_id)
        .bind(job_id)
        .bind(session_id)
        .bind(action_kind)
        .bind(action_name)
        .bind(status)
        .bind(success)
        .bind(message)
        .bind(details_json)
        .bind(sequence)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn action_logs_for_job(
        pool: &DatabasePool,
        job_id: &str,
    ) -> Result<Vec<ActionLogRow>, sqlx::Error> {
        sqlx::query_as::<_, ActionLogRow>(
            "SELECT * FROM plan_action_logs WHERE job_id = ? ORDER BY sequence",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::SHARED_JOB_STORE_TABLES;

    async fn test_pool() -> DatabasePool {
        let pool = sqlx::sqlite::SqlitePool::connect("sqlite::memory:").await.unwrap();
        for stmt in SHARED_JOB_STORE_TABLES {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn sequences_are_strictly_increasing() {
        let pool = test_pool().await;
        for i in 1..=3 {
            let seq = LogRepository::next_log_sequence(&pool, "job-1").await.unwrap();
            assert_eq!(seq, i);
            LogRepository::append_log(&pool, "job-1", seq, "info", "step", None)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn logs_since_cursor_excludes_already_seen() {
        let pool = test_pool().await;
        for i in 1..=5i64 {
            LogRepository::append_log(&pool, "job-1", i, "info", "step", None)
                .await
                .unwrap();
        }
        let resumed = LogRepository::logs_since(&pool, "job-1", 3).await.unwrap();
        assert_eq!(resumed.len(), 2);
        assert_eq!(resumed[0].sequence, 4);
    }
}
