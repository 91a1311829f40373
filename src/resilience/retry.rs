//! Whole-call retries for queue operations.
//!
//! # Responsibilities
//! - Re-issue a logical call after a retryable failure
//! - Sleep with jittered exponential backoff between attempts
//! - Give up after a fixed number of attempts, returning the last error

use std::future::Future;
use std::time::Duration;

use crate::error::QueueError;
use crate::resilience::backoff::calculate_backoff;

/// How many times to try a call and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, QueueError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QueueError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = calculate_backoff(
                    attempt,
                    policy.base_delay.as_millis() as u64,
                    policy.max_delay.as_millis() as u64,
                );
                tracing::debug!(
                    attempt,
                    max_attempts,
                    backend = e.backend().unwrap_or("-"),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying queue operation"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
