use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!(
        commit = env!("UIRESOLVE_GIT_HASH"),
        built = env!("UIRESOLVE_BUILD_DATE"),
        "Starting uiresolve v{}",
        env!("CARGO_PKG_VERSION")
    );

    let LoadedConfig {
        config,
        path,
        from_file,
    } = load_config(cli.config.as_ref()).await?;
    let cli_context = CliContext::new(config, path, from_file, cli.output);

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
