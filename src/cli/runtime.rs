use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{resolve_config_path, AppConfig};

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    /// False when no file existed and defaults were used
    pub from_file: bool,
}

/// Reads the configuration file, then applies `UIRESOLVE_*` overrides from the process
/// environment. An explicitly named file must exist.
pub async fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_config_path(explicit.map(|p| p.as_path()));
    let exists = fs::try_exists(&path).await.unwrap_or(false);
    if explicit.is_some() && !exists {
        bail!("config file {} does not exist", path.display());
    }

    let mut config = if exists {
        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config =
            AppConfig::from_yaml_str(&raw).with_context(|| format!("in {}", path.display()))?;
        info!("Loaded configuration from: {}", path.display());
        config
    } else {
        warn!("Config file not found, using defaults: {}", path.display());
        AppConfig::default()
    };

    for var in config.apply_env_overrides(|name| std::env::var(name).ok())? {
        info!(var, "timing override from environment");
    }

    Ok(LoadedConfig {
        config,
        path,
        from_file: exists,
    })
}
