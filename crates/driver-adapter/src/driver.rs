//! The driver boundary consumed by the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uiresolve_core_types::NodeHandle;

use crate::error::DriverError;

/// How a click is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    /// Real pointer input, subject to hit-testing.
    Native,
    /// DOM-level dispatch on the node itself, bypassing hit-testing.
    Synthetic,
}

/// Keys the engine knows how to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Enter,
    Escape,
    Space,
    Tab,
}

impl Key {
    /// DOM `KeyboardEvent.key` value.
    pub fn dom_key(&self) -> &'static str {
        match self {
            Key::Enter => "Enter",
            Key::Escape => "Escape",
            Key::Space => " ",
            Key::Tab => "Tab",
        }
    }
}

/// Minimal DOM query and input surface required by the engine.
///
/// Implementations own one browser session. The engine never calls a driver from two tasks
/// at once; drivers are `Send + Sync` only so they can live behind an `Arc`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// All nodes in the document matching `selector`, in document order.
    async fn query(&self, selector: &str) -> Result<Vec<NodeHandle>, DriverError>;

    /// Descendants of `root` matching `selector`, in document order.
    async fn query_within(
        &self,
        root: &NodeHandle,
        selector: &str,
    ) -> Result<Vec<NodeHandle>, DriverError>;

    /// Whether `node` is `ancestor` or one of its descendants.
    async fn contains(&self, ancestor: &NodeHandle, node: &NodeHandle)
        -> Result<bool, DriverError>;

    /// The next element sibling of `node`, if any.
    async fn next_sibling(&self, node: &NodeHandle) -> Result<Option<NodeHandle>, DriverError>;

    async fn is_visible(&self, node: &NodeHandle) -> Result<bool, DriverError>;

    async fn is_enabled(&self, node: &NodeHandle) -> Result<bool, DriverError>;

    async fn click(&self, node: &NodeHandle, mode: ClickMode) -> Result<(), DriverError>;

    async fn type_text(&self, node: &NodeHandle, text: &str) -> Result<(), DriverError>;

    async fn select_option(&self, node: &NodeHandle, value: &str) -> Result<(), DriverError>;

    async fn press_key(&self, node: &NodeHandle, key: Key) -> Result<(), DriverError>;

    async fn scroll_into_view(&self, node: &NodeHandle) -> Result<(), DriverError>;

    async fn attribute(&self, node: &NodeHandle, name: &str)
        -> Result<Option<String>, DriverError>;

    async fn text(&self, node: &NodeHandle) -> Result<Option<String>, DriverError>;

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        Ok(self.query(selector).await?.len())
    }
}
