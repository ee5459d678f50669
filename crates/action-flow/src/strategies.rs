//! Retry and backoff strategies

use std::time::Duration;

use crate::config::BackoffConfig;

/// Bounded retry with capped backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed, first one included
    pub max_attempts: u32,
    pub backoff: BackoffConfig,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffConfig) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Whether another attempt may follow `attempt` failed attempts
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following failure number `attempt`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let BackoffConfig {
            base_ms,
            max_ms,
            exponential,
        } = self.backoff;
        let total_ms = if exponential {
            // base_ms * 2^(attempt-1)
            let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1));
            base_ms.saturating_mul(multiplier)
        } else {
            base_ms
        };
        Duration::from_millis(total_ms.min(max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::new(3, BackoffConfig::default());

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_calculate_backoff() {
        let policy = RetryPolicy::new(
            5,
            BackoffConfig {
                base_ms: 1000,
                max_ms: 60_000,
                exponential: true,
            },
        );

        // Exponential backoff
        assert_eq!(policy.calculate_backoff(1).as_millis(), 1000);
        assert_eq!(policy.calculate_backoff(2).as_millis(), 2000);
        assert_eq!(policy.calculate_backoff(3).as_millis(), 4000);
        assert_eq!(policy.calculate_backoff(4).as_millis(), 8000);

        // Capped
        assert_eq!(policy.calculate_backoff(10).as_millis(), 60_000);
        assert_eq!(policy.calculate_backoff(200).as_millis(), 60_000);
    }

    #[test]
    fn test_fixed_backoff() {
        let policy = RetryPolicy::new(
            3,
            BackoffConfig {
                base_ms: 250,
                max_ms: 5_000,
                exponential: false,
            },
        );
        assert_eq!(policy.calculate_backoff(1), policy.calculate_backoff(7));
        assert_eq!(policy.calculate_backoff(3).as_millis(), 250);
    }
}
