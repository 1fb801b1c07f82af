/// Exponential backoff for polling chain and explorer state.
/// Tracks attempts and hands out capped, doubling delays.

use std::time::Duration;
use tracing::{info, warn};

/// Exponential backoff state tracker
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_interval: Duration,
    max_interval: Duration,
    current_attempt: u32,
    current_interval: Duration,
}

impl ExponentialBackoff {
    pub fn new(base_interval: Duration, max_interval: Duration) -> Self {
        ExponentialBackoff {
            base_interval,
            max_interval,
            current_attempt: 0,
            current_interval: base_interval,
        }
    }

    /// Record an unsuccessful poll and return how long to wait before the next one
    pub fn on_failure(&mut self, reason: &str) -> Duration {
        self.current_attempt += 1;

        // base * 2^(attempts - 1)
        let factor = 2_u32.saturating_pow(self.current_attempt.saturating_sub(1));
        let next_interval = self.base_interval.saturating_mul(factor);

        self.current_interval = next_interval.min(self.max_interval);

        warn!(
            attempt = self.current_attempt,
            interval_ms = self.current_interval.as_millis() as u64,
            reason = reason,
            "backing off before next attempt"
        );

        self.current_interval
    }

    pub fn on_success(&mut self) {
        if self.current_attempt > 0 {
            info!(
                attempts = self.current_attempt,
                "succeeded after {} attempts, resetting backoff", self.current_attempt
            );
        }
        self.current_attempt = 0;
        self.current_interval = self.base_interval;
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn interval(&self) -> Duration {
        self.current_interval
    }

    pub fn should_give_up(&self, max_total_attempts: u32) -> bool {
        self.current_attempt >= max_total_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_sequence() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(120));

        assert_eq!(backoff.on_failure("pending").as_secs(), 1);
        assert_eq!(backoff.on_failure("pending").as_secs(), 2);
        assert_eq!(backoff.on_failure("pending").as_secs(), 4);
        assert_eq!(backoff.on_failure("pending").as_secs(), 8);
    }

    #[test]
    fn test_backoff_max_interval_capped() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1));
        for _ in 0..40 {
            backoff.on_failure("pending");
        }
        assert_eq!(backoff.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_reset_on_success() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60));
        backoff.on_failure("a");
        backoff.on_failure("b");
        assert_eq!(backoff.attempts(), 2);
        assert!(backoff.should_give_up(2));

        backoff.on_success();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.interval(), Duration::from_secs(1));
        assert!(!backoff.should_give_up(2));
    }
}
