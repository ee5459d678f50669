use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let LoadedConfig {
        config,
        path,
        found,
        env_overrides,
    } = load_config(cli.config.as_ref()).await?;
    let _log_guard = init_logging(cli.log_level.as_deref(), cli.debug, &config.logging)?;

    info!(
        "Starting autoplay v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("AUTOPLAY_GIT_HASH"),
        env!("AUTOPLAY_BUILD_DATE")
    );
    if found {
        info!("Loaded configuration from: {}", path.display());
    } else {
        debug!("Config file not found, using defaults: {}", path.display());
    }
    if !env_overrides.is_empty() {
        info!(overrides = ?env_overrides, "Configuration overridden from environment");
    }

    let cli_context = CliContext::new(config, path, cli.output.clone());

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
