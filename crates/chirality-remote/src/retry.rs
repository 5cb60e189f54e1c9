//! Retry policy for remote resolution

use std::time::Duration;

/// Attempt ceiling, backoff base and per-attempt timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time
    pub base_delay: Duration,
    /// Bound on each single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` (clamped to at least 1)
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            timeout,
        }
    }

    /// Delay after failed attempt `attempt` (0-based): `base_delay * 2^attempt`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}
