//! Application configuration
//!
//! One YAML document for everything the engine treats as application data: poll and
//! timeout budgets, scope selectors, table selectors and browser launch settings. Every
//! section is optional and falls back to its defaults.

use std::path::{Path, PathBuf};

use action_locator::ScopeSelectors;
use action_primitives::EngineConfig;
use anyhow::{bail, Context, Result};
use driver_adapter::DriverConfig;
use perceiver_structural::TableSelectors;
use serde::{Deserialize, Serialize};

/// Project-local configuration file, checked before the user config directory.
pub const LOCAL_CONFIG_PATH: &str = "config/uiresolve.yaml";

/// Environment variables that override timing, and the field each one sets.
pub const ENV_OVERRIDES: [(&str, &str); 5] = [
    ("UIRESOLVE_RESOLVE_TIMEOUT_MS", "engine.timeouts.resolve_ms"),
    ("UIRESOLVE_TACTIC_TIMEOUT_MS", "engine.timeouts.tactic_ms"),
    ("UIRESOLVE_VERIFY_TIMEOUT_MS", "engine.timeouts.verify_ms"),
    ("UIRESOLVE_POLL_INTERVAL_MS", "engine.poll.interval_ms"),
    ("UIRESOLVE_SETTLE_MS", "engine.settle_ms"),
];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub scopes: ScopeSelectors,
    pub tables: TableSelectors,
    pub driver: DriverConfig,
}

impl AppConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let mut config: AppConfig =
            action_locator::from_yaml_str(raw).context("parsing configuration")?;
        config.engine.apply_settle();
        Ok(config)
    }

    /// YAML in the shape [`AppConfig::from_yaml_str`] reads back.
    pub fn to_yaml_string(&self) -> Result<String> {
        let mut out = Vec::new();
        {
            let mut serializer = serde_yaml::Serializer::new(&mut out);
            serde_yaml::with::singleton_map_recursive::serialize(self, &mut serializer)
                .context("rendering configuration")?;
        }
        Ok(String::from_utf8(out)?)
    }

    /// Checks the engine budgets and that no container selector is blank.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        let selectors = [
            ("scopes.table", &self.scopes.table),
            ("scopes.modal", &self.scopes.modal),
            ("scopes.row", &self.scopes.row),
            ("scopes.detail_row", &self.scopes.detail_row),
            ("tables.header_cell", &self.tables.header_cell),
            ("tables.row", &self.tables.row),
            ("tables.cell", &self.tables.cell),
        ];
        for (field, value) in selectors {
            if value.trim().is_empty() {
                bail!("{} must not be empty", field);
            }
        }
        if self.scopes.row_id_attributes.is_empty() {
            bail!("scopes.row_id_attributes needs at least one attribute");
        }
        self.tables.column_chooser.trigger.validate()?;
        self.tables.column_chooser.option.validate()?;
        self.tables.paginator.next.validate()?;
        self.tables.expand_toggle.validate()?;
        Ok(())
    }

    /// Applies the `UIRESOLVE_*` timing overrides found through `lookup` and returns the
    /// variables that were applied.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<Vec<&'static str>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        for (var, field) in ENV_OVERRIDES {
            let Some(raw) = lookup(var) else {
                continue;
            };
            let value: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{}={:?} is not a millisecond count", var, raw))?;
            let engine = &mut self.engine;
            match field {
                "engine.timeouts.resolve_ms" => engine.timeouts.resolve_ms = value,
                "engine.timeouts.tactic_ms" => engine.timeouts.tactic_ms = value,
                "engine.timeouts.verify_ms" => engine.timeouts.verify_ms = value,
                "engine.poll.interval_ms" => {
                    engine.poll.interval_ms = value;
                    engine.poll.max_interval_ms = engine.poll.max_interval_ms.max(value);
                }
                _ => engine.settle_ms = value,
            }
            applied.push(var);
        }
        self.engine.apply_settle();
        Ok(applied)
    }
}

/// Where configuration is read from: the explicit path, else the project-local file if it
/// exists, else `<config_dir>/uiresolve/config.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(dir) => dir.join("uiresolve").join("config.yaml"),
        None => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_documents_keep_defaults() {
        let config = AppConfig::from_yaml_str(
            r#"
engine:
  timeouts:
    verify_ms: 1500
scopes:
  modal: ".my-dialog"
tables:
  paginator:
    range_label: ".pager-info"
driver:
  headless: false
"#,
        )
        .unwrap();
        assert_eq!(config.engine.timeouts.verify_ms, 1500);
        assert_eq!(config.engine.timeouts.resolve_ms, 5000);
        assert_eq!(config.scopes.modal, ".my-dialog");
        assert_eq!(config.scopes.table, ScopeSelectors::default().table);
        assert_eq!(config.tables.paginator.range_label, ".pager-info");
        assert_eq!(config.tables.paginator.next.name, "next-page");
        assert!(!config.driver.headless);
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides_replace_timeouts() {
        let vars: HashMap<&str, &str> = [
            ("UIRESOLVE_VERIFY_TIMEOUT_MS", "900"),
            ("UIRESOLVE_POLL_INTERVAL_MS", " 800 "),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        let applied = config
            .apply_env_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(applied, ["UIRESOLVE_VERIFY_TIMEOUT_MS", "UIRESOLVE_POLL_INTERVAL_MS"]);
        assert_eq!(config.engine.timeouts.verify_ms, 900);
        assert_eq!(config.engine.poll.interval_ms, 800);
        assert_eq!(config.engine.poll.max_interval_ms, 800);
        assert_eq!(config.engine.timeouts.tactic_ms, 2000);
    }

    #[test]
    fn settle_delay_drives_the_ladder() {
        use action_primitives::ActionTactic;

        let config = AppConfig::from_yaml_str(
            "engine:\n  settle_ms: 450\n  ladder:\n    - scroll_then_native\n    - settle_then_native: 300\n",
        )
        .unwrap();
        assert_eq!(
            config.engine.ladder.tactics(),
            &[ActionTactic::ScrollThenNative, ActionTactic::SettleThenNative(450)]
        );

        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|name| (name == "UIRESOLVE_SETTLE_MS").then(|| "900".to_string()))
            .unwrap();
        assert!(config
            .engine
            .ladder
            .tactics()
            .contains(&ActionTactic::SettleThenNative(900)));
    }

    #[test]
    fn shown_configuration_reads_back() {
        let mut config = AppConfig::default();
        config.engine.settle_ms = 120;
        config.engine.apply_settle();
        let shown = config.to_yaml_string().unwrap();
        assert!(shown.contains("settle_then_native: 120"), "{}", shown);
        let back = AppConfig::from_yaml_str(&shown).unwrap();
        assert_eq!(back.engine, config.engine);
        assert_eq!(back.tables, config.tables);
    }

    #[test]
    fn garbage_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(|name| {
                (name == "UIRESOLVE_TACTIC_TIMEOUT_MS").then(|| "soon".to_string())
            })
            .unwrap_err();
        assert!(err.to_string().contains("UIRESOLVE_TACTIC_TIMEOUT_MS"));
    }

    #[test]
    fn blank_selectors_fail_validation() {
        let mut config = AppConfig::default();
        config.scopes.detail_row = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scopes.detail_row"));

        let mut config = AppConfig::default();
        config.engine.poll.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = Path::new("/tmp/elsewhere.yaml");
        assert_eq!(resolve_config_path(Some(explicit)), explicit);
    }
}
