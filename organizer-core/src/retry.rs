//! Retry with exponential backoff for transient remote failures
//!
//! Used for provider calls and recipe-store writes. Each call site retries
//! independently, so a store write after a successful classification never
//! re-triggers the classification.

use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};

/// Errors that can tell whether a retry may succeed
pub trait Transient {
    fn is_transient(&self) -> bool;

    /// Server-provided delay that overrides the computed backoff
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Backoff schedule
///
/// Delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`, plus up to `jitter` of random spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_millis(750),
        }
    }

    /// Policy without random spread, for deterministic schedules
    pub fn without_jitter(mut self) -> Self {
        self.jitter = Duration::ZERO;
        self
    }

    /// Delay before the given retry (1 = first retry)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if self.jitter.is_zero() {
            delay
        } else {
            let spread = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
            delay + Duration::from_millis(spread)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1250)
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// ceiling is reached. The last error is returned unchanged.
pub async fn retry_transient<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    // Permanent failure, no retry
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(err);
                }

                let wait = err.retry_after().unwrap_or_else(|| policy.backoff(attempt));

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = wait.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );

                tokio::time::sleep(wait).await;
            }
        }
    }
}
