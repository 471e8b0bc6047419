//! Per-tactic delivery of an interaction to the driver.

use std::time::Duration;

use driver_adapter::{ClickMode, Driver, DriverError, DriverErrorKind, Key};
use uiresolve_core_types::NodeHandle;

use crate::types::{ActionTactic, InteractionAction};

pub(super) async fn run(
    driver: &dyn Driver,
    node: &NodeHandle,
    action: &InteractionAction,
    tactic: ActionTactic,
) -> Result<(), DriverError> {
    match tactic {
        ActionTactic::ScrollThenNative => {
            driver.scroll_into_view(node).await?;
            native(driver, node, action).await
        }
        ActionTactic::SettleThenNative(settle_ms) => {
            tokio::time::sleep(Duration::from_millis(settle_ms)).await;
            native(driver, node, action).await
        }
        ActionTactic::Synthetic => match action {
            InteractionAction::Click => driver.click(node, ClickMode::Synthetic).await,
            other => Err(unsupported(other, tactic)),
        },
        ActionTactic::KeyboardEquivalent => match action.keyboard_equivalent() {
            Some(key) => driver.press_key(node, key).await,
            None => Err(unsupported(action, tactic)),
        },
    }
}

async fn native(
    driver: &dyn Driver,
    node: &NodeHandle,
    action: &InteractionAction,
) -> Result<(), DriverError> {
    match action {
        InteractionAction::Click => driver.click(node, ClickMode::Native).await,
        InteractionAction::Type(text) => driver.type_text(node, text).await,
        InteractionAction::SelectOption(value) => driver.select_option(node, value).await,
        InteractionAction::Press(key) => driver.press_key(node, *key).await,
        // No pointer form; Escape on the element is the native way to close it.
        InteractionAction::Dismiss => driver.press_key(node, Key::Escape).await,
    }
}

fn unsupported(action: &InteractionAction, tactic: ActionTactic) -> DriverError {
    DriverError::new(DriverErrorKind::Unsupported)
        .with_hint(format!("{} cannot deliver {}", tactic, action.name()))
}
