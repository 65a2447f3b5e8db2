//! Bounded retry with exponential backoff and jitter.
//!
//! The ceiling and spacing live in one place instead of ad hoc recursion at
//! call sites, so they can be tested and tuned.

use std::future::Future;
use std::time::Duration;

/// Retry ceiling and spacing
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt: base * 2^(attempt-1), capped, plus 10% jitter
    fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << (attempt - 1).min(16)) as u64;
        let capped = exp.min(self.max_delay.as_millis() as u64);
        let jitter = (capped as f64 * 0.1 * rand::random::<f64>()) as u64;
        Duration::from_millis(capped + jitter)
    }
}

/// Runs `op` until it succeeds, the error stops being retryable, or the
/// attempt ceiling is hit. Returns the last error when giving up.
pub async fn retry_with_backoff<T, E, Op, Fut, R>(
    policy: &RetryPolicy,
    mut op: Op,
    is_retryable: R,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.delay_after(attempt);
                log::debug!(
                    "Retryable failure (attempt {}/{}), backing off {:?}",
                    attempt,
                    policy.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
