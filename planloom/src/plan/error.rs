//! Plan Repository error taxonomy (spec §4.2).

use crate::db::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid anchor: {0}")]
    InvalidAnchor(String),

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<DatabaseError> for PlanError {
    fn from(err: DatabaseError) -> Self {
        if err.is_not_found() {
            PlanError::NotFound(err.to_string())
        } else {
            PlanError::StorageFailure(err.to_string())
        }
    }
}

impl From<sqlx::Error> for PlanError {
    fn from(err: sqlx::Error) -> Self {
        PlanError::from(DatabaseError::from(err))
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
