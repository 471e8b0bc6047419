use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Plain-text rendering for `--output human`.
pub trait HumanReadable {
    fn human(&self) -> String;
}

/// Renders `report` in `format`; JSON is pretty-printed.
pub fn render<T>(format: OutputFormat, report: &T) -> Result<String>
where
    T: Serialize + HumanReadable,
{
    Ok(match format {
        OutputFormat::Human => report.human(),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
    })
}

pub fn emit<T>(format: OutputFormat, report: &T) -> Result<()>
where
    T: Serialize + HumanReadable,
{
    println!("{}", render(format, report)?);
    Ok(())
}
