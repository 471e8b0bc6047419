use clap::Subcommand;

use super::columns::ColumnsArgs;
use super::config::ConfigArgs;
use super::probe::ProbeArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Resolve an intent against a live page and report what matched
    Probe(ProbeArgs),

    /// Print the live header map of a table
    Columns(ColumnsArgs),

    /// Inspect and validate configuration
    Config(ConfigArgs),
}
