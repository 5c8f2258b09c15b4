//! Exponential-backoff retry for transient failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Tuning for [`retry_with_backoff`].
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Retries after the first attempt, so `max_retries + 1` attempts total.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the per-retry delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    /// Delay before retry number `attempt` (0-based), following the capped
    /// exponential schedule. Pure, so the schedule is testable without
    /// sleeping.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_possible_wrap)]
        let factor = self.backoff_multiplier.powi(attempt as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, the error is classified non-retryable,
/// or the retry budget is exhausted.
///
/// Non-retryable errors are re-raised immediately, even on the first
/// attempt. The last error is returned once retries run out.
pub async fn retry_with_backoff<T, E, Op, Fut, P>(
    options: &RetryOptions,
    is_retryable: P,
    mut operation: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= options.max_retries || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = options.delay_for(attempt);
                warn!(
                    "attempt {}/{} failed ({err}), retrying in {delay:?}",
                    attempt + 1,
                    options.max_retries + 1,
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
