//! Plan Executor (C5, spec §4.5): dependency-ordered task execution, one LLM
//! call per ready node, with retry/backoff and response parsing. Live
//! progress is published through `jobs::stream::JobBroadcastRegistry`
//! rather than a dedicated streaming type — see `jobs::manager::JobManager`.

pub mod config;
pub mod error;
pub mod llm_executor;
pub mod parser;
pub mod retry;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, ExecutorResult};
pub use llm_executor::{execute, rerun_task, ExecutionSummary, StepResult};
pub use parser::ResponseParser;
pub use retry::{classify_error, retry_with_backoff, ErrorClass, RetryConfig};
