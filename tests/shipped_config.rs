//! The configuration, plans and intents shipped under `config/` stay loadable and usable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_locator::{Intent, StrategyPlan};
use action_primitives::Stopwatch;
use anyhow::Result;
use driver_adapter::{El, MemoryDriver};
use uiresolve_cli::cli::context::CliContext;
use uiresolve_cli::cli::probe::ProbeReport;
use uiresolve_cli::cli::OutputFormat;
use uiresolve_cli::AppConfig;
use uiresolve_core_types::ScopeContext;

fn shipped(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn intent(relative: &str) -> Result<Intent> {
    Ok(Intent::from_yaml_str(&std::fs::read_to_string(shipped(relative))?)?)
}

#[test]
fn shipped_config_matches_defaults() -> Result<()> {
    let raw = std::fs::read_to_string(shipped("config/uiresolve.yaml"))?;
    let config = AppConfig::from_yaml_str(&raw)?;
    config.validate()?;

    let defaults = AppConfig::default();
    assert_eq!(config.engine, defaults.engine);
    assert_eq!(config.scopes, defaults.scopes);
    assert_eq!(config.tables, defaults.tables);
    Ok(())
}

#[test]
fn shipped_plans_and_intents_validate() -> Result<()> {
    for plan in ["config/plans/save-button.yaml", "config/plans/table-checkbox.yaml"] {
        StrategyPlan::load(&shipped(plan))?.validate()?;
    }
    intent("config/intents/save.yaml")?.validate(&ScopeContext::Modal)?;
    let checkbox = intent("config/intents/credit-checkbox.yaml")?;
    checkbox.validate(&ScopeContext::TableAt(0))?;
    assert!(checkbox.validate(&ScopeContext::Page).is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn save_plan_resolves_inside_the_open_modal() -> Result<()> {
    let driver = MemoryDriver::new();
    let root = driver.root();
    driver.mount(&root, El::new("button").class("btn").text("Save"));
    driver.mount(
        &root,
        El::new("div")
            .class("modal")
            .class("show")
            .child(El::new("button").class("btn").text("Cancel"))
            .child(El::new("button").class("btn").text("Save")),
    );

    let ctx = CliContext::new(
        AppConfig::default(),
        shipped("config/uiresolve.yaml"),
        true,
        OutputFormat::Json,
    );
    let engine = ctx.engine(Arc::new(driver.clone()))?;
    let plan = StrategyPlan::load(&shipped("config/plans/save-button.yaml"))?;
    let save = intent("config/intents/save.yaml")?;
    let scope = ScopeContext::Modal;

    let clock = Stopwatch::start();
    let resolution = engine.resolve(&save, &plan, &scope).await?;
    let report = ProbeReport::new(&save, &scope, &plan, &resolution, &clock);

    let in_modal = driver.find(".modal.show button.btn");
    assert_eq!(report.handle, Some(in_modal[1].to_string()));
    assert_eq!(report.strategy.as_deref(), Some("bootstrap-button"));
    Ok(())
}
