//! Retry policy for single JIRA calls.

use crate::Error;
use std::time::Duration;

/// Exponential backoff with `Retry-After` support.
///
/// Only errors reporting [`Error::is_retryable`] are retried: transport
/// failures, 429 and the transient 5xx statuses.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_min_delay(mut self, d: Duration) -> Self {
        self.min_delay = d;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    /// `min_delay * 2^attempt`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.min_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;
        let delay = base.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        Duration::from_millis(delay.min(cap))
    }

    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` counts retries already made (0 after the first failure).
    pub fn next_delay(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if attempt >= self.max_retries || !error.is_retryable() {
            return None;
        }
        let delay = match error.retry_after_ms() {
            Some(ms) => Duration::from_millis(ms),
            None => self.backoff(attempt),
        };
        Some(delay.min(self.max_delay))
    }
}
