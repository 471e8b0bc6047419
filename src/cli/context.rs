use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_gate::Engine;
use anyhow::Result;
use driver_adapter::Driver;
use perceiver_structural::TablePerceiver;

use super::output::OutputFormat;
use crate::config::AppConfig;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    config_from_file: bool,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(
        config: AppConfig,
        config_path: PathBuf,
        config_from_file: bool,
        output: OutputFormat,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            config_from_file,
            output,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_from_file(&self) -> bool {
        self.config_from_file
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Engine over `driver` with the configured timing and scope selectors.
    pub fn engine(&self, driver: Arc<dyn Driver>) -> Result<Engine> {
        Ok(Engine::new(
            driver,
            self.config.engine.clone(),
            self.config.scopes.clone(),
        )?)
    }

    pub fn perceiver(&self, driver: Arc<dyn Driver>) -> Result<TablePerceiver> {
        Ok(TablePerceiver::new(
            self.engine(driver)?,
            self.config.tables.clone(),
        ))
    }
}
