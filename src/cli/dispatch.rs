use anyhow::Result;

use super::columns::cmd_columns;
use super::config::cmd_config;
use super::probe::cmd_probe;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use crate::cli::env::CliArgs;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Probe(args) => cmd_probe(args, ctx).await,
        Commands::Columns(args) => cmd_columns(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
