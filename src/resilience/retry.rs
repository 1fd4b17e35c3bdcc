//! Bounded retry around the upstream call.
//!
//! Off by default: the baseline contract is a single attempt per request.

use crate::{Error, Result};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Configuration for retry logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. `0` disables retries.
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay.max(min_delay);
        self
    }

    /// Exponential backoff: min_delay * 2^attempt, capped at max_delay.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.min_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(cap))
    }

    /// Delay before the next attempt, or `None` when `error` must be returned as is.
    ///
    /// Only transport failures and provider 5xx are retried; 4xx never are.
    pub fn should_retry(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if attempt >= self.max_retries || !error.is_retryable() {
            return None;
        }
        Some(self.backoff(attempt))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or retries run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.should_retry(attempt, &error) {
                    Some(delay) => {
                        warn!(
                            attempt = attempt + 1,
                            max_retries = self.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "retrying upstream call"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(error),
                },
            }
        }
    }
}
