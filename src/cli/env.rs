use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;

/// uiresolve - resolve and drive elements of data-heavy web apps
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::ConfigAction;
    use uiresolve_core_types::ScopeContext;

    #[test]
    fn probe_takes_a_scope_expression() {
        let cli = CliArgs::try_parse_from([
            "uiresolve",
            "--output",
            "json",
            "probe",
            "--url",
            "http://localhost:4200/billing",
            "--plan",
            "config/plans/save-button.yaml",
            "--intent",
            "config/intents/save.yaml",
            "--scope",
            "table[1]",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Probe(args) => {
                assert_eq!(args.scope, ScopeContext::TableAt(1));
                assert_eq!(args.budget_ms, None);
            }
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn bad_scope_is_a_usage_error() {
        let err = CliArgs::try_parse_from([
            "uiresolve",
            "probe",
            "--url",
            "http://localhost",
            "--plan",
            "p.yaml",
            "--intent",
            "i.yaml",
            "--scope",
            "expanded-row[]",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("expanded-row"));
    }

    #[test]
    fn config_validate_accepts_several_plans() {
        let cli = CliArgs::try_parse_from([
            "uiresolve", "-d", "config", "validate", "--plan", "a.yaml", "--plan", "b.yaml",
        ])
        .unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Config(args) => match args.action {
                ConfigAction::Validate { plans } => assert_eq!(plans.len(), 2),
                other => panic!("parsed {:?}", other),
            },
            other => panic!("parsed {:?}", other),
        }
    }
}
