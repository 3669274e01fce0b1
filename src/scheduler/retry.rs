//! Retry policy for credential refresh.

use std::time::Duration;

/// Exponential backoff over a bounded number of attempts.
///
/// The default matches the credential refresh policy: 3 attempts with 2s
/// and 4s waits between them. Exhaustion is terminal for one cycle only,
/// never for the playlist's schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), or `None` when the
    /// attempt was the last one.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.base_delay * 2u32.pow(attempt - 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}
