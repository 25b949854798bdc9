//! Database row types.
//!
//! All timestamp fields are stored as ISO8601 strings (TEXT in SQLite) via
//! sqlx's `chrono` feature; see individual modules for table shapes (spec §6
//! "Persistence layout").

pub mod action_log;
pub mod job;
pub mod job_log;
pub mod message;
pub mod plan;
pub mod session;
pub mod snapshot;
pub mod task;

pub use action_log::ActionLogRow;
pub use job::{JobRow, JobStats, JobStatus, JobType};
pub use job_log::{JobLogRow, LogLevel};
pub use message::{ChatMessageRow, MessageRole};
pub use plan::{PlanRow, PlanSummary};
pub use session::{ChatSessionRow, NameSource, SessionSettings};
pub use snapshot::SnapshotRow;
pub use task::{TaskDependencyRow, TaskRow};
