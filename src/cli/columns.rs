use anyhow::Result;
use clap::Args;
use perceiver_structural::StructuralPerceiver;
use serde::Serialize;
use uiresolve_core_types::ScopeContext;

use super::browser::BrowserSession;
use super::context::CliContext;
use super::output::{emit, HumanReadable};

#[derive(Args, Clone, Debug)]
pub struct ColumnsArgs {
    /// Page to open
    #[arg(long)]
    pub url: String,

    /// 0-based table ordinal on the page
    #[arg(long, default_value_t = 0)]
    pub table: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColumnEntry {
    pub index: usize,
    pub header: String,
}

/// Live header map of one table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColumnsReport {
    pub scope: String,
    pub found: bool,
    pub columns: Vec<ColumnEntry>,
    pub rows: usize,
    pub no_columns_message: bool,
}

impl HumanReadable for ColumnsReport {
    fn human(&self) -> String {
        if !self.found {
            return if self.no_columns_message {
                format!("{}: no columns selected", self.scope)
            } else {
                format!("{}: no table rendered", self.scope)
            };
        }
        let mut lines = vec![format!(
            "{}: {} column(s), {} row(s)",
            self.scope,
            self.columns.len(),
            self.rows
        )];
        for column in &self.columns {
            let header = if column.header.is_empty() {
                "(blank)"
            } else {
                column.header.as_str()
            };
            lines.push(format!("  [{}] {}", column.index, header));
        }
        lines.join("\n")
    }
}

pub async fn cmd_columns(args: ColumnsArgs, ctx: &CliContext) -> Result<()> {
    let scope = ScopeContext::TableAt(args.table);
    let session = BrowserSession::open(&ctx.config().driver, &args.url).await?;
    let report = read_columns(ctx, &session, &scope).await;
    session.close().await?;
    emit(ctx.output(), &report?)
}

async fn read_columns(
    ctx: &CliContext,
    session: &BrowserSession,
    scope: &ScopeContext,
) -> Result<ColumnsReport> {
    let perceiver = ctx.perceiver(session.driver())?;
    let model = perceiver.table_model(scope).await?;
    let snapshot = perceiver.visible_columns(scope).await?;
    Ok(match model {
        Some(model) => ColumnsReport {
            scope: scope.to_string(),
            found: true,
            columns: model
                .headers()
                .iter()
                .enumerate()
                .map(|(index, header)| ColumnEntry {
                    index,
                    header: header.clone(),
                })
                .collect(),
            rows: model.row_count(),
            no_columns_message: snapshot.no_columns_message,
        },
        None => ColumnsReport {
            scope: scope.to_string(),
            found: false,
            columns: Vec::new(),
            rows: 0,
            no_columns_message: snapshot.no_columns_message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_headers_keep_their_position() {
        let report = ColumnsReport {
            scope: "table[0]".into(),
            found: true,
            columns: vec![
                ColumnEntry { index: 0, header: "Name".into() },
                ColumnEntry { index: 1, header: String::new() },
                ColumnEntry { index: 2, header: "Credit".into() },
            ],
            rows: 4,
            no_columns_message: false,
        };
        assert_eq!(
            report.human(),
            "table[0]: 3 column(s), 4 row(s)\n  [0] Name\n  [1] (blank)\n  [2] Credit"
        );
    }

    #[test]
    fn missing_table_explains_why() {
        let report = ColumnsReport {
            scope: "table[2]".into(),
            found: false,
            columns: Vec::new(),
            rows: 0,
            no_columns_message: true,
        };
        assert_eq!(report.human(), "table[2]: no columns selected");
    }
}
