use std::sync::Arc;

use anyhow::{Context, Result};
use driver_adapter::{CdpDriver, Driver, DriverConfig};
use tracing::{info, warn};

/// A launched browser with one page open at the requested URL.
pub struct BrowserSession {
    driver: Arc<CdpDriver>,
}

impl BrowserSession {
    pub async fn open(config: &DriverConfig, url: &str) -> Result<Self> {
        let driver = CdpDriver::launch(config)
            .await
            .context("launching the browser")?;
        if let Err(err) = driver.goto(url).await {
            let _ = driver.close().await;
            return Err(err).with_context(|| format!("opening {}", url));
        }
        info!(url, "page opened");
        Ok(Self {
            driver: Arc::new(driver),
        })
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }

    /// Shuts the browser down once every engine built on it has been dropped.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.driver) {
            Ok(driver) => driver.close().await.context("closing the browser")?,
            Err(_) => warn!("driver still shared; browser closes when the process exits"),
        }
        Ok(())
    }
}
