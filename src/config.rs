//! Application configuration
//!
//! One YAML file carries the engine tunables, logging, and the replay
//! device profile. Every section is optional; missing keys take defaults.

use std::env;
use std::path::PathBuf;

use action_flow::EngineConfig;
use anyhow::{Context, Result};
use autoplay_core_types::{Capability, CapabilitySet};
use serde::{Deserialize, Serialize};

pub const ENV_LOG_LEVEL: &str = "AUTOPLAY_LOG_LEVEL";
pub const ENV_MAX_RETRIES: &str = "AUTOPLAY_MAX_RETRIES";
pub const ENV_AMBIGUITY_EPSILON: &str = "AUTOPLAY_AMBIGUITY_EPSILON";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when neither `RUST_LOG` nor `--log-level` is given
    pub level: String,

    /// Daily rolling log file; the directory is created on demand
    pub file: Option<PathBuf>,

    /// Emit stderr logs as JSON lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

/// Profile of the virtual device used by `run`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Capabilities enabled at runtime; `None` enables everything
    pub capabilities: Option<Vec<Capability>>,
}

impl ReplayConfig {
    pub fn capability_set(&self) -> CapabilitySet {
        match &self.capabilities {
            Some(list) => list.iter().copied().collect(),
            None => CapabilitySet::all(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Apply `AUTOPLAY_*` environment overrides on top of the file values.
    ///
    /// Returns the variables that were applied. Config is loaded before the
    /// subscriber exists, so callers log them once logging is up.
    pub fn apply_env_overrides(&mut self) -> Result<Vec<&'static str>> {
        let mut applied = Vec::new();

        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            self.logging.level = level;
            applied.push(ENV_LOG_LEVEL);
        }

        if let Ok(raw) = env::var(ENV_MAX_RETRIES) {
            self.engine.default_max_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got {:?}", ENV_MAX_RETRIES, raw))?;
            applied.push(ENV_MAX_RETRIES);
        }

        if let Ok(raw) = env::var(ENV_AMBIGUITY_EPSILON) {
            self.engine.ambiguity_epsilon = raw.trim().parse().with_context(|| {
                format!("{} must be a number, got {:?}", ENV_AMBIGUITY_EPSILON, raw)
            })?;
            applied.push(ENV_AMBIGUITY_EPSILON);
        }

        Ok(applied)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("Invalid engine configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.default_max_retries, 3);
        assert_eq!(config.replay.capability_set(), CapabilitySet::all());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_yaml(
            r#"
engine:
  ambiguity_epsilon: 0.1
  backoff:
    base_ms: 50
replay:
  capabilities: [tap, screen_capture]
"#,
        )
        .unwrap();

        assert_eq!(config.engine.ambiguity_epsilon, 0.1);
        assert_eq!(config.engine.backoff.base_ms, 50);
        assert_eq!(config.engine.backoff.max_ms, 5000);
        let caps = config.replay.capability_set();
        assert!(caps.contains(Capability::Tap));
        assert!(!caps.contains(Capability::Swipe));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_capability() {
        assert!(AppConfig::from_yaml("replay:\n  capabilities: [teleport]\n").is_err());
    }
}
