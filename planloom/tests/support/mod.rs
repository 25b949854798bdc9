//! Shared harness for integration tests: wires a real (tempdir-backed)
//! registry + per-plan file cache + shared jobs store, mirroring
//! `planloom-cli`'s own startup sequence so the tests exercise the same
//! wiring a real deployment uses rather than bare in-memory structs.

use planloom::db::connection::DatabaseConnection;
use planloom::db::plan_store::PlanFileCache;
use planloom::db::schema::{REGISTRY_TABLES, SHARED_JOB_STORE_TABLES};
use planloom::jobs::manager::JobManager;
use planloom::plan::PlanRepository;
use planloom::session::SessionStore;
use std::path::PathBuf;
use std::sync::Arc;

pub mod scripted_model;

#[allow(dead_code)]
pub struct Harness {
    pub plans: Arc<PlanRepository>,
    pub jobs: Arc<JobManager>,
    pub sessions: Arc<SessionStore>,
    dir: PathBuf,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("planloom-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let registry_url = format!("sqlite://{}/registry.sqlite3?mode=rwc", dir.display());
        let registry = Arc::new(DatabaseConnection::new(&registry_url).await.unwrap());
        registry.apply_schema(REGISTRY_TABLES).await.unwrap();

        let jobs_url = format!("sqlite://{}/jobs.sqlite3?mode=rwc", dir.display());
        let shared_store = Arc::new(DatabaseConnection::new(&jobs_url).await.unwrap());
        shared_store.apply_schema(SHARED_JOB_STORE_TABLES).await.unwrap();

        let files = Arc::new(PlanFileCache::new(dir.join("plans")));

        let plans = Arc::new(PlanRepository::new(Arc::clone(&registry), Arc::clone(&files)));
        let sessions = Arc::new(SessionStore::new(Arc::clone(&registry)));
        let jobs = Arc::new(JobManager::new(registry, files, shared_store));

        Self { plans, jobs, sessions, dir }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}
