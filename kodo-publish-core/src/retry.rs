//! Bounded retry with exponential backoff.
//!
//! Every failure is retried the same way; the operation closure is called
//! afresh for each attempt so it can rebuild whatever it needs (tokens,
//! requests) instead of reusing state from a previous try.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Ceiling on a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = `retries + 1`.
    pub retries: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    pub factor: f64,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            min_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Some(DEFAULT_MAX_DELAY),
        }
    }
}

impl RetryPolicy {
    /// Same retry count, no waiting between attempts.
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            min_delay: Duration::ZERO,
            factor: 1.0,
            max_delay: None,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.min_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.min_delay.as_secs_f64() * self.factor.powi(exponent);
        // Saturates instead of panicking when the backoff overflows.
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) if delay > max => max,
            _ => delay,
        }
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Returns the error of the last attempt.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt <= policy.retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    %label,
                    attempt,
                    retries = policy.retries,
                    ?delay,
                    error = %e,
                    "Attempt failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}
