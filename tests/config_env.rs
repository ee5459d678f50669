use std::env;
use std::fs;

use autoplay_cli::cli::runtime::load_config;
use autoplay_cli::config::{ENV_AMBIGUITY_EPSILON, ENV_LOG_LEVEL, ENV_MAX_RETRIES};
use autoplay_cli::AppConfig;
use autoplay_core_types::Capability;
use serial_test::serial;

fn clear_env() {
    for key in [ENV_LOG_LEVEL, ENV_MAX_RETRIES, ENV_AMBIGUITY_EPSILON] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let mut config = AppConfig::from_yaml("engine:\n  default_max_retries: 7\n").unwrap();

    env::set_var(ENV_MAX_RETRIES, "4");
    env::set_var(ENV_AMBIGUITY_EPSILON, "0.12");
    env::set_var(ENV_LOG_LEVEL, "warn");
    let applied = config.apply_env_overrides();
    clear_env();

    assert_eq!(
        applied.unwrap(),
        vec![ENV_LOG_LEVEL, ENV_MAX_RETRIES, ENV_AMBIGUITY_EPSILON]
    );
    assert_eq!(config.engine.default_max_retries, 4);
    assert_eq!(config.engine.ambiguity_epsilon, 0.12);
    assert_eq!(config.logging.level, "warn");
}

#[test]
#[serial]
fn malformed_env_value_is_an_error() {
    clear_env();
    env::set_var(ENV_MAX_RETRIES, "lots");
    let result = AppConfig::default().apply_env_overrides();
    clear_env();

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains(ENV_MAX_RETRIES), "{}", message);
}

#[tokio::test]
#[serial]
async fn loads_explicit_config_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autoplay.yaml");
    fs::write(
        &path,
        r#"
engine:
  edge_retry_budget: 5
  max_task_duration_ms: null
logging:
  level: debug
replay:
  capabilities: [tap, screen_capture, wait]
"#,
    )
    .unwrap();

    env::set_var(ENV_LOG_LEVEL, "trace");
    let loaded = load_config(Some(&path)).await;
    clear_env();

    let loaded = loaded.unwrap();
    assert!(loaded.found);
    assert_eq!(loaded.env_overrides, vec![ENV_LOG_LEVEL]);
    assert_eq!(loaded.path, path);
    assert_eq!(loaded.config.engine.edge_retry_budget, 5);
    assert_eq!(loaded.config.engine.max_task_duration_ms, None);
    assert_eq!(loaded.config.logging.level, "trace");

    let caps = loaded.config.replay.capability_set();
    assert!(caps.contains(Capability::Wait));
    assert!(!caps.contains(Capability::KeyEvent));
}

#[tokio::test]
#[serial]
async fn env_override_is_validated() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autoplay.yaml");
    fs::write(&path, "{}").unwrap();

    env::set_var(ENV_MAX_RETRIES, "0");
    let result = load_config(Some(&path)).await;
    clear_env();

    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn missing_explicit_config_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");
    assert!(load_config(Some(&missing)).await.is_err());
}
