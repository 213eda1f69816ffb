//! Bounded retry with exponential backoff
//!
//! Attempt `n` (zero-based) that fails is followed by a pause of
//! `base_delay * 2^n` plus up to `max_jitter` of random jitter, until
//! `max_attempts` total attempts have been made.

use std::time::Duration;

use crate::infrastructure::config::{HttpConfig, defaults};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::FETCH_MAX_ATTEMPTS,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_jitter_ms: defaults::RETRY_MAX_JITTER_MS,
        }
    }
}

impl RetryPolicy {
    pub fn from_http_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.retry_base_delay_ms,
            max_jitter_ms: defaults::RETRY_MAX_JITTER_MS,
        }
    }

    /// No pauses between attempts; used by tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: 0,
            max_jitter_ms: 0,
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (zero-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Pause after the failed attempt number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16));
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=self.max_jitter_ms)
        };
        Duration::from_millis(exponential.saturating_add(jitter))
    }

    /// HTTP statuses worth another attempt: throttling and server errors
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_budget_is_three_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }

    #[test]
    fn backoff_doubles_within_jitter() {
        let policy = RetryPolicy::default();
        for attempt in 0..3 {
            let base = 500u64 << attempt;
            let delay = policy.delay_for(attempt).as_millis() as u64;
            assert!(delay >= base && delay <= base + 250, "attempt {attempt}: {delay}");
        }
        assert_eq!(RetryPolicy::immediate(3).delay_for(2), Duration::ZERO);
    }

    #[rstest]
    #[case(429, true)]
    #[case(500, true)]
    #[case(503, true)]
    #[case(200, false)]
    #[case(403, false)]
    #[case(404, false)]
    fn retryable_statuses(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(RetryPolicy::is_retryable_status(status), expected);
    }
}
