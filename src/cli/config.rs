use std::path::PathBuf;

use action_locator::StrategyPlan;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file, defaults and environment overrides)
    Show,

    /// Validate the configuration and, optionally, strategy plan files
    Validate {
        /// Strategy plan files to check as well
        #[arg(long = "plan", value_name = "FILE")]
        plans: Vec<PathBuf>,
    },

    /// Print which configuration file is in effect
    Path,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => match ctx.output() {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ctx.config())?),
            OutputFormat::Human => {
                println!("Current configuration ({}):", describe_source(ctx));
                println!("{}", ctx.config().to_yaml_string()?);
            }
        },
        ConfigAction::Validate { plans } => {
            ctx.config()
                .validate()
                .with_context(|| format!("validating {}", describe_source(ctx)))?;
            println!("Configuration ({}) is valid", describe_source(ctx));
            for plan_path in plans {
                let plan = StrategyPlan::load(&plan_path)?;
                plan.validate()
                    .with_context(|| format!("validating {}", plan_path.display()))?;
                println!(
                    "Plan '{}' ({}) is valid: {} strateg{}",
                    plan.name,
                    plan_path.display(),
                    plan.strategies.len(),
                    if plan.strategies.len() == 1 { "y" } else { "ies" }
                );
            }
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            if !ctx.config_from_file() {
                println!("(file not present; defaults in effect)");
            }
        }
    }

    Ok(())
}

fn describe_source(ctx: &CliContext) -> String {
    if ctx.config_from_file() {
        ctx.config_path().display().to_string()
    } else {
        "defaults".to_string()
    }
}
