//! Job repository. Operates against either a per-plan file's `jobs` table or
//! the shared system-jobs store — both share the same shape (spec §6), so a
//! single repository works against whichever [`DatabasePool`] the Job
//! Manager hands it (see `crate::jobs::manager`).

use crate::db::connection::DatabasePool;
use crate::db::models::JobRow;
use chrono::Utc;

pub struct JobRepository;

impl JobRepository {
    pub async fn create(
        pool: &DatabasePool,
        id: &str,
        job_type: &str,
        plan_id: Option<i64>,
        target_task_id: Option<i64>,
        session_id: Option<&str>,
        parameters_json: &str,
    ) -> Result<JobRow, sqlx::Error> {
        sqlx::query_as::<_, JobRow>(
            "INSERT INTO jobs
                (id, job_type, status, plan_id, target_task_id, session_id, parameters_json, created_at)
             VALUES (?, ?, 'queued', ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(id)
        .bind(job_type)
        .bind(plan_id)
        .bind(target_task_id)
        .bind(session_id)
        .bind(parameters_json)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn get(pool: &DatabasePool, id: &str) -> Result<Option<JobRow>, sqlx::Error> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_running(pool: &DatabasePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET status = 'running', started_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_succeeded(
        pool: &DatabasePool,
        id: &str,
        result_json: Option<&str>,
        stats_json: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET status = 'succeeded', result_json = ?, stats_json = ?, finished_at = ? WHERE id = ?",
        )
        .bind(result_json)
        .bind(stats_json)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(
        pool: &DatabasePool,
        id: &str,
        error: &str,
        stats_json: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET status = 'failed', error = ?, stats_json = ?, finished_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(stats_json)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Retention sweep (spec §4.3 `cleanup`): delete jobs finished before
    /// `older_than`, keeping at most `max_rows` total regardless of age.
    pub async fn cleanup(
        pool: &DatabasePool,
        older_than: chrono::DateTime<Utc>,
        max_rows: i64,
    ) -> Result<u64, sqlx::Error> {
        let deleted_by_age = sqlx::query(
            "DELETE FROM jobs WHERE finished_at IS NOT NULL AND finished_at < ?",
        )
        .bind(older_than)
        .execute(pool)
        .await?
        .rows_affected();

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs").fetch_one(pool).await?;
        let mut deleted_by_cap = 0u64;
        if total > max_rows {
            let overflow = total - max_rows;
            let result = sqlx::query(
                "DELETE FROM jobs WHERE id IN (
                    SELECT id FROM jobs WHERE finished_at IS NOT NULL ORDER BY finished_at ASC LIMIT ?
                 )",
            )
            .bind(overflow)
            .execute(pool)
            .await?;
            deleted_by_cap = result.rows_affected();
        }

        Ok(deleted_by_age + deleted_by_cap)
    }
}
