//! Job Manager error taxonomy (spec §4.3, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        JobError::StorageFailure(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for JobError {
    fn from(err: crate::db::DatabaseError) -> Self {
        JobError::StorageFailure(err.to_string())
    }
}

impl From<crate::plan::PlanError> for JobError {
    fn from(err: crate::plan::PlanError) -> Self {
        match err {
            crate::plan::PlanError::NotFound(msg) => JobError::NotFound(msg),
            other => JobError::StorageFailure(other.to_string()),
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
