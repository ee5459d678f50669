//! Engine tuning knobs

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::EngineError;

/// Backoff between retries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    /// Double the delay on every attempt; otherwise wait `base_ms` each time
    pub exponential: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 200,
            max_ms: 5_000,
            exponential: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Top two node scores closer than this are ambiguous
    pub ambiguity_epsilon: f64,
    /// Used when a task sets no `max_retries`
    pub default_max_retries: u32,
    /// Used when a task sets no `step_timeout_ms`
    pub default_step_timeout_ms: u64,
    pub backoff: BackoffConfig,
    /// Extra attempts for one edge before re-planning
    pub edge_retry_budget: u32,
    pub max_stabilize_delay_ms: u64,
    /// Pause after a recovery sequence before re-capturing
    pub recovery_delay_ms: u64,
    /// Hard ceiling on a whole run
    pub max_task_duration_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ambiguity_epsilon: 0.05,
            default_max_retries: 3,
            default_step_timeout_ms: 10_000,
            backoff: BackoffConfig::default(),
            edge_retry_budget: 2,
            max_stabilize_delay_ms: 5_000,
            recovery_delay_ms: 1_000,
            max_task_duration_ms: Some(600_000),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.ambiguity_epsilon.is_finite() && self.ambiguity_epsilon >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "ambiguity_epsilon must be finite and >= 0, got {}",
                self.ambiguity_epsilon
            )));
        }
        if self.default_max_retries == 0 {
            return Err(EngineError::InvalidConfig(
                "default_max_retries must be at least 1".to_string(),
            ));
        }
        if self.default_step_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "default_step_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.backoff.base_ms > self.backoff.max_ms {
            return Err(EngineError::InvalidConfig(format!(
                "backoff base_ms ({}) exceeds max_ms ({})",
                self.backoff.base_ms, self.backoff.max_ms
            )));
        }
        Ok(())
    }

    pub fn max_stabilize_delay(&self) -> Duration {
        Duration::from_millis(self.max_stabilize_delay_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    pub fn max_task_duration(&self) -> Option<Duration> {
        self.max_task_duration_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.backoff.max_ms, 5_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = EngineConfig {
            ambiguity_epsilon: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            default_max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            default_step_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(msg)) if msg.contains("default_step_timeout_ms")
        ));
    }
}
