//! Repository pattern implementations for database access.
//!
//! `plan_repo`/`session_repo`/`message_repo` operate against the main
//! registry pool; `task_repo` operates against a per-plan file pool
//! (`crate::db::plan_store::PlanFileCache`); `job_repo`/`log_repo` operate
//! against whichever pool the Job Manager hands them (per-plan file or the
//! shared system-jobs store).

pub mod job_repo;
pub mod log_repo;
pub mod message_repo;
pub mod plan_repo;
pub mod session_repo;
pub mod snapshot_repo;
pub mod task_repo;

pub use job_repo::JobRepository;
pub use log_repo::LogRepository;
pub use message_repo::MessageRepository;
pub use plan_repo::PlanRepository;
pub use session_repo::SessionRepository;
pub use snapshot_repo::SnapshotRepository;
pub use task_repo::TaskRepository;
