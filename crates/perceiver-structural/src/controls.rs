//! Column chooser and paginator.

use action_gate::{ActionGate, TextExpectation, VerifiedAction, WaitCondition};
use action_locator::{Intent, Resolution};
use action_primitives::{ActionOutcome, InteractionAction, OutcomeStatus, Stopwatch};
use tracing::{info, warn};
use uiresolve_core_types::{NodeHandle, ScopeContext};

use crate::api::StructuralPerceiver;
use crate::errors::PerceiverError;
use crate::structural::TablePerceiver;

impl TablePerceiver {
    /// Shows or hides the column headed `header` through the "select headers" dropdown.
    ///
    /// `chooser_scope` is the table the dropdown belongs to and `ordinal` picks among the
    /// dropdown triggers inside it. The header is re-read from the live table afterwards;
    /// the dropdown is closed again before returning.
    pub async fn set_column_visible(
        &self,
        header: &str,
        visible: bool,
        chooser_scope: &ScopeContext,
        ordinal: usize,
    ) -> Result<ActionOutcome, PerceiverError> {
        let clock = Stopwatch::start();
        let wanted = if visible { "shown" } else { "hidden" };
        if self.visible_columns(chooser_scope).await?.contains(header) == visible {
            return Ok(clock
                .outcome(OutcomeStatus::Succeeded)
                .with_detail(format!("column '{}' already {}", header, wanted)));
        }

        let chooser = &self.selectors.column_chooser;
        let open = VerifiedAction::click(
            Intent::new("button").labelled(&chooser.trigger_label).nth(ordinal),
            chooser.trigger.clone(),
            chooser_scope.clone(),
            WaitCondition::present(&chooser.panel).within(ScopeContext::Page),
        );
        let opened = self.engine.perform_and_verify(&open).await?;
        if !opened.succeeded() {
            return Ok(opened);
        }

        let header_shown = WaitCondition::selector_text(
            &self.selectors.header_cell,
            TextExpectation::Equals(header.to_string()),
        )
        .within(chooser_scope.clone());
        let option = Intent::new("option").labelled(header);
        let toggle = VerifiedAction::click(
            option.clone(),
            chooser.option.clone(),
            ScopeContext::Page,
            if visible {
                header_shown
            } else {
                WaitCondition::not(header_shown)
            },
        );
        let toggled = self.engine.perform_and_verify(&toggle).await?;

        let close = VerifiedAction::new(
            option,
            chooser.option.clone(),
            ScopeContext::Page,
            InteractionAction::Dismiss,
            WaitCondition::absent(&chooser.panel).within(ScopeContext::Page),
        );
        let closed = self.engine.perform_and_verify(&close).await?;

        if !toggled.succeeded() {
            return Ok(toggled);
        }
        if !closed.succeeded() {
            warn!(
                action_id = %clock.action_id(),
                header,
                detail = closed.detail.as_deref().unwrap_or(""),
                "column toggled but the dropdown stayed open"
            );
            return Ok(closed);
        }
        info!(action_id = %clock.action_id(), header, state = wanted, "column visibility set");
        let mut outcome = clock
            .outcome(OutcomeStatus::Succeeded)
            .with_detail(format!("column '{}' {}", header, wanted));
        outcome.strategy_used = toggled.strategy_used;
        outcome.tactic_used = toggled.tactic_used;
        Ok(outcome)
    }

    /// Moves the paginator in `scope` one page forward and waits for its range label to
    /// change. `NotFound` on the last page, where the control is disabled.
    pub async fn next_page(&self, scope: &ScopeContext) -> Result<ActionOutcome, PerceiverError> {
        let clock = Stopwatch::start();
        let paginator = &self.selectors.paginator;
        let intent = Intent::new("button");
        let element = match self.engine.resolve(&intent, &paginator.next, scope).await? {
            Resolution::Found(element) => element,
            other => return Ok(other.to_outcome(&clock)),
        };
        if !self.control_enabled(&element.handle).await? {
            return Ok(clock
                .outcome(OutcomeStatus::NotFound)
                .with_strategy(element.matched_strategy)
                .with_detail("next-page control is disabled; already on the last page"));
        }

        let before = self.range_label(scope).await?;
        let request = VerifiedAction::click(
            intent,
            paginator.next.clone(),
            scope.clone(),
            WaitCondition::selector_text(
                &paginator.range_label,
                TextExpectation::NotEquals(before.unwrap_or_default()),
            ),
        );
        Ok(self.engine.perform_and_verify(&request).await?)
    }

    /// Text of the paginator's range label, if one is rendered in `scope`.
    pub async fn range_label(&self, scope: &ScopeContext) -> Result<Option<String>, PerceiverError> {
        let labels = self.driver().query(&self.selectors.paginator.range_label).await?;
        let Some(label) = self.scopes().resolve(scope, labels).await?.into_iter().next() else {
            return Ok(None);
        };
        let text = self.driver().text(&label).await?.unwrap_or_default();
        Ok(Some(action_locator::normalize_ws(&text)))
    }

    async fn control_enabled(&self, control: &NodeHandle) -> Result<bool, PerceiverError> {
        let driver = self.driver();
        if !driver.is_enabled(control).await? {
            return Ok(false);
        }
        if driver.attribute(control, "aria-disabled").await?.as_deref() == Some("true") {
            return Ok(false);
        }
        let class = driver.attribute(control, "class").await?.unwrap_or_default();
        Ok(!class.split_whitespace().any(|c| c == "disabled" || c.ends_with("-disabled")))
    }
}
