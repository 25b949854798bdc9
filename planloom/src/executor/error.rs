//! Plan Executor error taxonomy (spec §4.5, §7).

use crate::jobs::JobError;
use crate::plan::PlanError;
use planloom_llm::LlmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("cycle detected among task dependencies: {0}")]
    CycleDetected(String),

    #[error("failed to parse executor response: {0}")]
    ParseError(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
