//! Expandable rows.
//!
//! A row counts as expanded exactly while its detail row is rendered right after it. The
//! toggle is resolved inside the row through its own strategy plan and clicked as a verified
//! action whose post-condition is the detail-row marker, so two candidate toggles in one row
//! come back as `AmbiguousMatch` instead of a guess.

use action_gate::{ActionGate, VerifiedAction, WaitCondition};
use action_locator::Intent;
use action_primitives::{ActionOutcome, OutcomeStatus, Stopwatch};
use driver_adapter::DriverError;
use tracing::{debug, info};
use uiresolve_core_types::{NodeHandle, ScopeContext};

use crate::errors::PerceiverError;
use crate::model::RowExpansion;
use crate::structural::TablePerceiver;

impl TablePerceiver {
    /// Settled state of the row with `row_id`; `None` when the row is not rendered.
    pub async fn expansion_state(&self, row_id: &str) -> Result<Option<RowExpansion>, PerceiverError> {
        let Some(row) = self.scopes().find_row(row_id).await? else {
            return Ok(None);
        };
        Ok(Some(RowExpansion::from_marker(self.marker_present(&row).await?)))
    }

    /// Expands the row; a no-op when it already is.
    pub async fn expand_row(&self, row_id: &str) -> Result<ActionOutcome, PerceiverError> {
        self.drive_row(row_id, RowExpansion::Expanded).await
    }

    /// Collapses the row; a no-op when it already is.
    pub async fn collapse_row(&self, row_id: &str) -> Result<ActionOutcome, PerceiverError> {
        self.drive_row(row_id, RowExpansion::Collapsed).await
    }

    async fn marker_present(&self, row: &NodeHandle) -> Result<bool, DriverError> {
        Ok(self.scopes().detail_row_after(row).await?.is_some())
    }

    async fn drive_row(
        &self,
        row_id: &str,
        target: RowExpansion,
    ) -> Result<ActionOutcome, PerceiverError> {
        let clock = Stopwatch::start();
        let Some(row) = self.scopes().find_row(row_id).await? else {
            return Ok(clock
                .outcome(OutcomeStatus::NotFound)
                .with_detail(format!("row '{}' not rendered", row_id)));
        };
        let current = RowExpansion::from_marker(self.marker_present(&row).await?);
        if current == target {
            return Ok(clock
                .outcome(OutcomeStatus::Succeeded)
                .with_detail(format!("row '{}' already {}", row_id, target)));
        }

        let expanded = WaitCondition::present(self.scopes().selectors().detail_row.clone())
            .within(ScopeContext::ExpandedRow(row_id.to_string()));
        let post_condition = match target {
            RowExpansion::Collapsed => WaitCondition::not(expanded),
            _ => expanded,
        };
        let request = VerifiedAction::click(
            Intent::new("expand-toggle"),
            self.selectors.expand_toggle.clone(),
            ScopeContext::Row(row_id.to_string()),
            post_condition,
        );
        let outcome = self.engine.perform_and_verify(&request).await?;
        match outcome.status {
            OutcomeStatus::Succeeded => {
                info!(
                    action_id = %outcome.action_id,
                    row_id,
                    state = %target,
                    strategy = outcome.strategy_used.as_deref().unwrap_or(""),
                    elapsed_ms = outcome.elapsed_ms,
                    "row settled"
                );
                Ok(outcome)
            }
            OutcomeStatus::TimedOut => {
                let present = match self.scopes().find_row(row_id).await? {
                    Some(row) => self.marker_present(&row).await?,
                    None => false,
                };
                let state = current.toggle().observe(present);
                debug!(row_id, state = %state, "row did not settle");
                let verify_ms = self.engine.config().timeouts.verify_ms;
                Ok(outcome.with_detail(format!(
                    "row '{}' still {} after {}ms",
                    row_id, state, verify_ms
                )))
            }
            _ => Ok(outcome),
        }
    }
}
