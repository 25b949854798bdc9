//! Session Store error taxonomy (spec §4.7, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        SessionError::StorageFailure(err.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
