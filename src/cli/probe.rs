use std::path::PathBuf;
use std::time::Duration;

use action_locator::{Intent, Resolution, StrategyPlan};
use action_primitives::{OutcomeStatus, Stopwatch};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs;
use uiresolve_core_types::ScopeContext;

use super::browser::BrowserSession;
use super::context::CliContext;
use super::output::{emit, HumanReadable};

#[derive(Args, Clone, Debug)]
pub struct ProbeArgs {
    /// Page to open
    #[arg(long)]
    pub url: String,

    /// Strategy plan (YAML)
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Intent (YAML)
    #[arg(long, value_name = "FILE")]
    pub intent: PathBuf,

    /// page, modal, table[N], expanded-row[ID] or row[ID]
    #[arg(long, default_value = "page")]
    pub scope: ScopeContext,

    /// Resolution budget; defaults to the configured resolve timeout
    #[arg(long, value_name = "MS")]
    pub budget_ms: Option<u64>,
}

/// What one resolution attempt found.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub intent: String,
    pub scope: String,
    pub plan: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

impl ProbeReport {
    pub fn new(
        intent: &Intent,
        scope: &ScopeContext,
        plan: &StrategyPlan,
        resolution: &Resolution,
        clock: &Stopwatch,
    ) -> Self {
        let outcome = resolution.to_outcome(clock);
        let (handle, matches) = match resolution {
            Resolution::Found(found) => (Some(found.handle.to_string()), None),
            Resolution::Ambiguous { matches, .. } => (None, Some(*matches)),
            Resolution::NotFound { .. } => (None, None),
        };
        Self {
            intent: intent.to_string(),
            scope: scope.to_string(),
            plan: plan.name.clone(),
            status: outcome.status,
            handle,
            strategy: outcome.strategy_used,
            matches,
            detail: outcome.detail,
            elapsed_ms: outcome.elapsed_ms,
        }
    }
}

impl HumanReadable for ProbeReport {
    fn human(&self) -> String {
        let mut lines = vec![format!(
            "{} in {} via plan '{}': {} ({}ms)",
            self.intent, self.scope, self.plan, self.status, self.elapsed_ms
        )];
        if let Some(strategy) = &self.strategy {
            lines.push(format!("  strategy: {}", strategy));
        }
        if let Some(handle) = &self.handle {
            lines.push(format!("  handle:   {}", handle));
        }
        if let Some(matches) = self.matches {
            lines.push(format!("  matches:  {}", matches));
        }
        if let Some(detail) = &self.detail {
            lines.push(format!("  detail:   {}", detail));
        }
        lines.join("\n")
    }
}

pub async fn cmd_probe(args: ProbeArgs, ctx: &CliContext) -> Result<()> {
    let plan = StrategyPlan::load(&args.plan)?;
    plan.validate()?;
    let raw = fs::read_to_string(&args.intent)
        .await
        .with_context(|| format!("reading {}", args.intent.display()))?;
    let intent = Intent::from_yaml_str(&raw)
        .with_context(|| format!("parsing intent {}", args.intent.display()))?;
    intent.validate(&args.scope)?;

    let budget = args
        .budget_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| ctx.config().engine.timeouts.resolve());

    let session = BrowserSession::open(&ctx.config().driver, &args.url).await?;
    let report = {
        let engine = ctx.engine(session.driver())?;
        let clock = Stopwatch::start();
        let resolution = engine
            .resolve_within(&intent, &plan, &args.scope, budget)
            .await;
        resolution.map(|resolution| ProbeReport::new(&intent, &args.scope, &plan, &resolution, &clock))
    };
    session.close().await?;
    emit(ctx.output(), &report?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::ResolvedElement;
    use uiresolve_core_types::NodeHandle;

    #[test]
    fn found_report_names_handle_and_strategy() {
        let intent = Intent::new("button").labelled("Save");
        let plan = StrategyPlan::clickable();
        let scope = ScopeContext::Modal;
        let resolution = Resolution::Found(ResolvedElement {
            handle: NodeHandle::new("el-7"),
            matched_strategy: "aria-label".into(),
            scope: scope.clone(),
        });
        let report = ProbeReport::new(&intent, &scope, &plan, &resolution, &Stopwatch::start());
        assert_eq!(report.status, OutcomeStatus::Succeeded);
        assert_eq!(report.handle.as_deref(), Some("el-7"));
        assert_eq!(report.strategy.as_deref(), Some("aria-label"));

        let human = report.human();
        assert!(human.starts_with("button \"Save\" in modal via plan 'clickable': succeeded"));
        assert!(human.contains("handle:   el-7"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert!(json.get("matches").is_none());
    }

    #[test]
    fn ambiguous_report_carries_the_count() {
        let intent = Intent::new("button");
        let plan = StrategyPlan::clickable();
        let resolution = Resolution::Ambiguous {
            strategy: "role-tag".into(),
            matches: 3,
            detail: "three buttons".into(),
        };
        let report = ProbeReport::new(
            &intent,
            &ScopeContext::TableAt(1),
            &plan,
            &resolution,
            &Stopwatch::start(),
        );
        assert_eq!(report.status, OutcomeStatus::AmbiguousMatch);
        assert_eq!(report.matches, Some(3));
        assert_eq!(report.scope, "table[1]");
        assert_eq!(report.handle, None);
    }
}
