//! Retry policy for chunk dispatch.

use std::time::Duration;

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Calculate exponential backoff delay for a given attempt.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// How often, and how patiently, a chunk is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
        }
    }

    /// Wait before attempt number `attempt + 1`, or `None` when exhausted.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| backoff_delay(attempt - 1, self.base))
    }
}
