//! Structured Action Agent error taxonomy (spec §4.6, §7).

use crate::decomposer::bfs::DecomposerError;
use crate::executor::ExecutorError;
use crate::jobs::JobError;
use crate::plan::PlanError;
use crate::session::SessionError;
use planloom_llm::LlmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM reply not parseable, or a parameter schema violation (spec §7
    /// "ValidationError"). Surfaced in the step's `message`; the turn
    /// otherwise succeeds with empty/partial actions.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Action requires a bound plan and none is bound (spec §7 "PlanNotBound").
    #[error("action requires a bound plan")]
    PlanNotBound,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid anchor: {0}")]
    InvalidAnchor(String),

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// Upstream LLM timeout or malformed output past the retry cap (spec §7
    /// "LLMFailure").
    #[error("llm failure: {0}")]
    LlmFailure(String),

    /// Tool handler raised or returned `success=false` (spec §7 "ToolFailure").
    #[error("tool failure: {0}")]
    ToolFailure(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

impl From<PlanError> for AgentError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::NotFound(msg) => AgentError::NotFound(msg),
            PlanError::InvalidAnchor(msg) => AgentError::InvalidAnchor(msg),
            PlanError::CycleDetected(msg) => AgentError::CycleDetected(msg),
            PlanError::StorageFailure(msg) => AgentError::StorageFailure(msg),
        }
    }
}

impl From<JobError> for AgentError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(msg) => AgentError::NotFound(msg),
            other => AgentError::StorageFailure(other.to_string()),
        }
    }
}

impl From<SessionError> for AgentError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(msg) => AgentError::NotFound(msg),
            other => AgentError::StorageFailure(other.to_string()),
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        AgentError::LlmFailure(err.to_string())
    }
}

impl From<DecomposerError> for AgentError {
    fn from(err: DecomposerError) -> Self {
        AgentError::StorageFailure(err.to_string())
    }
}

impl From<ExecutorError> for AgentError {
    fn from(err: ExecutorError) -> Self {
        AgentError::StorageFailure(err.to_string())
    }
}
