//! Retry logic for executor LLM calls: exponential backoff with jitter and
//! error classification (transient vs permanent), mirroring the teacher's
//! retry strategy but classifying against `planloom_llm::LlmError` directly
//! instead of pattern-matching error message text.

use crate::executor::error::{ExecutorError, ExecutorResult};
use planloom_llm::LlmError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Classification of errors for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that may succeed on retry (rate limits, timeouts, 5xx).
    Transient,
    /// Permanent errors that won't succeed on retry (4xx, invalid auth).
    Permanent,
    /// Unknown errors - treat as transient by default.
    Unknown,
}

/// Retry strategy configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_initial_backoff(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    pub fn with_max_backoff(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32)) as u64;
        let delay_ms = delay_ms.min(self.max_backoff_ms);
        let delay_ms = if self.jitter {
            let jitter_amount = (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay_ms + jitter_amount
        } else {
            delay_ms
        };
        Duration::from_millis(delay_ms)
    }
}

/// Classify an error to determine if it should be retried. Only LLM-boundary
/// errors carry enough structure to classify; everything else (storage,
/// plan-shape) is treated as non-retryable by the caller's own logic.
pub fn classify_error(error: &ExecutorError) -> ErrorClass {
    match error {
        ExecutorError::Llm(llm_err) => classify_llm_error(llm_err),
        _ => ErrorClass::Unknown,
    }
}

fn classify_llm_error(err: &LlmError) -> ErrorClass {
    if err.is_auth_error() {
        return ErrorClass::Permanent;
    }
    if err.is_retryable() {
        return ErrorClass::Transient;
    }
    match err {
        LlmError::ModelNotFound(_) | LlmError::InvalidRequest(_) => ErrorClass::Permanent,
        _ => ErrorClass::Unknown,
    }
}

/// Execute a function with retry logic, logging each attempt and classifying
/// failures so permanent errors abort immediately instead of burning through
/// the full retry budget (spec §4.5 step 2: "on exception, retry up to
/// `max_retries` with exponential backoff; exhausted -> `failed`").
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> ExecutorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExecutorResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            info!(operation = operation_name, attempt, max_retries = config.max_retries, "retrying operation");
        }

        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(operation = operation_name, attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                let class = classify_error(&e);
                debug!(operation = operation_name, attempt, error = %e, ?class, "operation failed");

                if class == ErrorClass::Permanent {
                    error!(operation = operation_name, error = %e, "permanent error, aborting retries");
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < config.max_retries {
                    let delay = config.backoff_delay(attempt);
                    warn!(operation = operation_name, attempt, delay_ms = delay.as_millis(), "transient error, retrying after delay");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let final_error = last_error.unwrap_or_else(|| {
        ExecutorError::ParseError(format!(
            "operation '{operation_name}' failed after {} retries with no captured error",
            config.max_retries
        ))
    });
    error!(operation = operation_name, max_retries = config.max_retries, error = %final_error, "all retry attempts exhausted");
    Err(final_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_is_exponential_without_jitter() {
        let config = RetryConfig::new(3).with_initial_backoff(1000).with_jitter(false);
        assert_eq!(config.backoff_delay(0).as_millis(), 1000);
        assert_eq!(config.backoff_delay(1).as_millis(), 2000);
        assert_eq!(config.backoff_delay(2).as_millis(), 4000);
    }

    #[test]
    fn backoff_delay_is_capped() {
        let config = RetryConfig::new(10)
            .with_initial_backoff(1000)
            .with_max_backoff(5000)
            .with_jitter(false);
        assert_eq!(config.backoff_delay(5).as_millis(), 5000);
    }

    #[test]
    fn rate_limit_and_timeout_are_transient() {
        assert_eq!(classify_llm_error(&LlmError::RateLimitExceeded("429".into())), ErrorClass::Transient);
        assert_eq!(classify_llm_error(&LlmError::Timeout("slow".into())), ErrorClass::Transient);
    }

    #[test]
    fn auth_errors_are_permanent() {
        assert_eq!(classify_llm_error(&LlmError::AuthenticationError("bad key".into())), ErrorClass::Permanent);
        assert_eq!(classify_llm_error(&LlmError::ApiKeyNotFound("X".into())), ErrorClass::Permanent);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        use std::sync::{Arc, Mutex};

        let config = RetryConfig::new(3).with_initial_backoff(5).with_jitter(false);
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = retry_with_backoff(&config, "test_op", move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let mut a = attempts.lock().unwrap();
                *a += 1;
                if *a < 3 {
                    Err(ExecutorError::Llm(LlmError::ServiceUnavailable("503".into())))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn aborts_immediately_on_permanent_error() {
        use std::sync::{Arc, Mutex};

        let config = RetryConfig::new(3).with_initial_backoff(5);
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: ExecutorResult<()> = retry_with_backoff(&config, "test_op", move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                *attempts.lock().unwrap() += 1;
                Err(ExecutorError::Llm(LlmError::AuthenticationError("nope".into())))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(*attempts.lock().unwrap(), 1);
    }
}
