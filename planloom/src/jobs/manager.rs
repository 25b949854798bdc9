//! Job Manager (C3, spec §4.3): create/track background work, append logs
//! with strictly increasing sequences, and broadcast live updates to
//! subscribers.

use crate::db::connection::{DatabaseConnection, DatabasePool};
use crate::db::models::{JobLogRow, JobRow, JobStats, JobStatus, JobType};
use crate::db::plan_store::PlanFileCache;
use crate::db::repositories::{JobRepository, LogRepository};
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::redact::redact;
use crate::jobs::stream::{JobBroadcastRegistry, StreamEvent};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default retention sweep parameters (spec §6 environment configuration:
/// job retention days / row cap), overridable via `cleanup`'s arguments.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_MAX_ROWS: i64 = 10_000;

pub struct JobManager {
    registry: Arc<DatabaseConnection>,
    files: Arc<PlanFileCache>,
    shared_store: Arc<DatabaseConnection>,
    job_locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    broadcaster: JobBroadcastRegistry,
}

impl JobManager {
    pub fn new(
        registry: Arc<DatabaseConnection>,
        files: Arc<PlanFileCache>,
        shared_store: Arc<DatabaseConnection>,
    ) -> Self {
        Self {
            registry,
            files,
            shared_store,
            job_locks: AsyncMutex::new(HashMap::new()),
            broadcaster: JobBroadcastRegistry::new(),
        }
    }

    /// The pool backing a job: a per-plan file if it has a `plan_id`,
    /// otherwise the shared system-jobs store (spec §3 "Job... target plan id
    /// (nullable; null => stored in a shared system store)").
    async fn pool_for(&self, plan_id: Option<i64>) -> JobResult<Arc<DatabaseConnection>> {
        match plan_id {
            Some(id) => Ok(self.files.get(id).await?),
            None => Ok(Arc::clone(&self.shared_store)),
        }
    }

    /// Locate a job's pool without knowing its `plan_id` up front, via the
    /// main registry's `plan_job_index` (spec §6 `plan_job_index`).
    async fn locate(&self, job_id: &str) -> JobResult<Arc<DatabaseConnection>> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT plan_id FROM plan_job_index WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(self.registry.pool())
                .await
                .map_err(JobError::from)?;
        match row {
            Some((plan_id,)) => self.pool_for(plan_id).await,
            None => Ok(Arc::clone(&self.shared_store)),
        }
    }

    async fn lock_for(&self, job_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.job_locks.lock().await;
        Arc::clone(
            locks
                .entry(job_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    pub async fn create(
        &self,
        job_type: JobType,
        plan_id: Option<i64>,
        target_task_id: Option<i64>,
        session_id: Option<&str>,
        parameters: serde_json::Value,
    ) -> JobResult<JobRow> {
        let id = Uuid::new_v4().to_string();
        let pool = self.pool_for(plan_id).await?;
        let parameters_json = parameters.to_string();

        let row = JobRepository::create(
            pool.pool(),
            &id,
            job_type.as_str(),
            plan_id,
            target_task_id,
            session_id,
            &parameters_json,
        )
        .await?;

        sqlx::query(
            "INSERT INTO plan_job_index (job_id, plan_id, job_type, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(plan_id)
        .bind(job_type.as_str())
        .bind(JobStatus::Queued.as_str())
        .bind(Utc::now())
        .execute(self.registry.pool())
        .await
        .map_err(JobError::from)?;

        info!(job_id = %id, job_type = job_type.as_str(), plan_id = ?plan_id, "job created");
        Ok(row)
    }

    pub async fn get_job(&self, job_id: &str) -> JobResult<JobRow> {
        let pool = self.locate(job_id).await?;
        JobRepository::get(pool.pool(), job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    async fn update_index_status(&self, job_id: &str, status: JobStatus, finished: bool) -> JobResult<()> {
        if finished {
            sqlx::query("UPDATE plan_job_index SET status = ?, finished_at = ? WHERE job_id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(job_id)
                .execute(self.registry.pool())
                .await
                .map_err(JobError::from)?;
        } else {
            sqlx::query("UPDATE plan_job_index SET status = ? WHERE job_id = ?")
                .bind(status.as_str())
                .bind(job_id)
                .execute(self.registry.pool())
                .await
                .map_err(JobError::from)?;
        }
        Ok(())
    }

    pub async fn mark_running(&self, job_id: &str) -> JobResult<()> {
        let pool = self.locate(job_id).await?;
        JobRepository::mark_running(pool.pool(), job_id).await?;
        self.update_index_status(job_id, JobStatus::Running, false).await?;
        debug!(job_id = %job_id, "job running");
        Ok(())
    }

    pub async fn mark_success(
        &self,
        job_id: &str,
        result: Option<serde_json::Value>,
        stats: JobStats,
    ) -> JobResult<()> {
        let pool = self.locate(job_id).await?;
        let result_json = result.map(|r| r.to_string());
        let stats_json = serde_json::to_string(&stats).ok();
        JobRepository::mark_succeeded(pool.pool(), job_id, result_json.as_deref(), stats_json.as_deref())
            .await?;
        self.update_index_status(job_id, JobStatus::Succeeded, true).await?;
        info!(job_id = %job_id, "job succeeded");
        self.broadcaster
            .publish(job_id, StreamEvent::Terminal(JobStatus::Succeeded))
            .await;
        Ok(())
    }

    pub async fn mark_failure(&self, job_id: &str, error: &str, stats: JobStats) -> JobResult<()> {
        let pool = self.locate(job_id).await?;
        let stats_json = serde_json::to_string(&stats).ok();
        JobRepository::mark_failed(pool.pool(), job_id, error, stats_json.as_deref()).await?;
        self.update_index_status(job_id, JobStatus::Failed, true).await?;
        warn!(job_id = %job_id, error = %error, "job failed");
        self.broadcaster
            .publish(job_id, StreamEvent::Terminal(JobStatus::Failed))
            .await;
        Ok(())
    }

    pub async fn append_log(
        &self,
        job_id: &str,
        level: &str,
        message: &str,
        metadata: Option<serde_json::Value>,
    ) -> JobResult<JobLogRow> {
        let pool = self.locate(job_id).await?;
        let lock = self.lock_for(job_id).await;
        let _guard = lock.lock().await;

        let sequence = LogRepository::next_log_sequence(pool.pool(), job_id).await?;
        let metadata_json = metadata.map(|m| m.to_string());
        let row = LogRepository::append_log(pool.pool(), job_id, sequence, level, message, metadata_json.as_deref())
            .await?;

        self.broadcaster.publish(job_id, StreamEvent::Log(row.clone())).await;
        Ok(row)
    }

    /// Append a redacted action-execution record (spec §4.3
    /// `append_action_log`; spec §9 "Redaction": `details_json` is redacted
    /// before being written).
    #[allow(clippy::too_many_arguments)]
    pub async fn append_action_log(
        &self,
        plan_id: Option<i64>,
        job_id: &str,
        session_id: Option<&str>,
        action_kind: &str,
        action_name: &str,
        status: &str,
        success: bool,
        message: Option<&str>,
        details: Option<serde_json::Value>,
    ) -> JobResult<()> {
        let pool = self.locate(job_id).await?;
        let lock = self.lock_for(job_id).await;
        let _guard = lock.lock().await;

        let sequence = LogRepository::next_action_sequence(pool.pool(), job_id).await?;
        let details_json = details.as_ref().map(|d| redact(d).to_string());

        LogRepository::append_action_log(
            pool.pool(),
            plan_id,
            job_id,
            session_id,
            sequence,
            action_kind,
            action_name,
            status,
            success,
            message,
            details_json.as_deref(),
        )
        .await?;
        Ok(())
    }

    /// Snapshot of logs after `cursor`, for a subscriber's initial catch-up
    /// (spec §4.3 `subscribe`: "snapshot, then events").
    pub async fn logs_since(&self, job_id: &str, cursor: i64) -> JobResult<Vec<JobLogRow>> {
        let pool = self.locate(job_id).await?;
        Ok(LogRepository::logs_since(pool.pool(), job_id, cursor).await?)
    }

    /// Full action-log history for a job, ordered by sequence (spec §6
    /// `GET /jobs/{id}` returns "job snapshot + logs + action logs").
    pub async fn action_logs(&self, job_id: &str) -> JobResult<Vec<crate::db::models::ActionLogRow>> {
        let pool = self.locate(job_id).await?;
        Ok(LogRepository::action_logs_for_job(pool.pool(), job_id).await?)
    }

    /// Live subscription handle; the caller drains [`Self::logs_since`] as a
    /// snapshot first, then reads from this receiver (spec §4.3 `subscribe`,
    /// spec §8 scenario E reconnection-by-cursor).
    pub async fn subscribe(&self, job_id: &str) -> tokio::sync::broadcast::Receiver<StreamEvent> {
        self.broadcaster.subscribe(job_id).await
    }

    /// Retention sweep across both the shared store and every cached
    /// per-plan file currently open (spec §4.3 `cleanup`). Per-plan files not
    /// presently cached are swept lazily the next time they're opened; this
    /// mirrors the teacher's "best-effort background sweep" pattern rather
    /// than walking the filesystem for every plan on every sweep.
    pub async fn cleanup(&self, retention_days: i64, max_rows: i64) -> JobResult<u64> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let mut deleted = JobRepository::cleanup(self.shared_store.pool(), cutoff, max_rows).await?;
        sqlx::query("DELETE FROM plan_job_index WHERE finished_at IS NOT NULL AND finished_at < ?")
            .bind(cutoff)
            .execute(self.registry.pool())
            .await
            .map_err(JobError::from)?;
        for pool in self.files.cached_pools().await {
            deleted += JobRepository::cleanup(pool.pool(), cutoff, max_rows).await?;
        }
        Ok(deleted)
    }

    /// True if the stored status string parses to a terminal [`JobStatus`].
    pub fn is_terminal_status(status: &str) -> bool {
        JobStatus::from_str(status).map(|s| s.is_terminal()).unwrap_or(false)
    }
}
