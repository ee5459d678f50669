use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, LoggingConfig};

const LOCAL_CONFIG: &str = "config/autoplay.yaml";

/// Install the global subscriber.
///
/// Logs go to stderr so structured command output on stdout stays parseable.
/// The returned guard flushes the log file and must live until exit.
pub fn init_logging(
    level: Option<&str>,
    debug: bool,
    logging: &LoggingConfig,
) -> Result<Option<WorkerGuard>> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level
            .unwrap_or(&logging.level)
            .parse()
            .context("Invalid log level")?
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(daily_appender(path)?);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let json = logging.json;
    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn daily_appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let name = path
        .file_name()
        .with_context(|| format!("logging.file {} does not name a file", path.display()))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    Ok(tracing_appender::rolling::daily(dir, name))
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    /// False when no file existed and defaults were used
    pub found: bool,
    /// Environment variables that overrode file values
    pub env_overrides: Vec<&'static str>,
}

/// Where the config file is looked up when `--config` is not given
pub fn default_config_path() -> PathBuf {
    // Priority: ./config/autoplay.yaml > ~/.config/autoplay/config.yaml
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(mut path) => {
            path.push("autoplay");
            path.push("config.yaml");
            path
        }
        None => local,
    }
}

/// Load configuration, then apply environment overrides and validate.
///
/// An explicit path must exist; the default locations fall back to defaults.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let (path, explicit) = match config_path {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };

    let found = path.exists();
    let mut config = if found {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        AppConfig::from_yaml(&content)
            .with_context(|| format!("Failed to load {}", path.display()))?
    } else if explicit {
        bail!("Config file not found: {}", path.display());
    } else {
        AppConfig::default()
    };

    let env_overrides = config.apply_env_overrides()?;
    config.validate()?;

    Ok(LoadedConfig {
        config,
        path,
        found,
        env_overrides,
    })
}
