//! Interaction escalator
//!
//! Drives one [`InteractionAction`] against a node by walking a [`TacticLadder`]:
//! 1. scroll into view, then native input
//! 2. settle, then native input again (animation still running, overlay fading out)
//! 3. synthetic DOM dispatch that bypasses hit-testing (clicks only)
//! 4. keyboard equivalent (Enter, Escape, or the pressed key)
//!
//! The first tactic that returns without a driver error wins.

mod tactics;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use driver_adapter::{Driver, DriverError};
use tracing::{debug, info, warn};
use uiresolve_core_types::NodeHandle;

use crate::types::{
    ActionOutcome, ActionTactic, InteractionAction, OutcomeStatus, Stopwatch, TacticLadder,
};

/// Delivers interactions to nodes.
#[async_trait]
pub trait Interactor: Send + Sync {
    /// Runs `action` on `node`, escalating through `ladder` until one tactic lands.
    async fn perform(
        &self,
        node: &NodeHandle,
        action: &InteractionAction,
        ladder: &TacticLadder,
        clock: &Stopwatch,
    ) -> ActionOutcome;
}

/// Default [`Interactor`] backed by a driver.
pub struct Escalator {
    driver: Arc<dyn Driver>,
    tactic_timeout: Duration,
}

impl Escalator {
    pub fn new(driver: Arc<dyn Driver>, tactic_timeout: Duration) -> Self {
        Self {
            driver,
            tactic_timeout,
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// One time-boxed attempt.
    async fn attempt(
        &self,
        node: &NodeHandle,
        action: &InteractionAction,
        tactic: ActionTactic,
    ) -> Result<(), AttemptError> {
        let run = tactics::run(self.driver.as_ref(), node, action, tactic);
        match tokio::time::timeout(self.tactic_timeout, run).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(AttemptError::Driver(err)),
            Err(_) => Err(AttemptError::TimedOut(self.tactic_timeout)),
        }
    }
}

enum AttemptError {
    Driver(DriverError),
    TimedOut(Duration),
}

impl AttemptError {
    fn describe(&self, tactic: ActionTactic) -> String {
        match self {
            AttemptError::Driver(err) => format!("{}: {}", tactic, err),
            AttemptError::TimedOut(limit) => {
                format!("{}: timed out after {}ms", tactic, limit.as_millis())
            }
        }
    }
}

#[async_trait]
impl Interactor for Escalator {
    async fn perform(
        &self,
        node: &NodeHandle,
        action: &InteractionAction,
        ladder: &TacticLadder,
        clock: &Stopwatch,
    ) -> ActionOutcome {
        let mut last_error: Option<String> = None;
        let mut attempts = 0usize;

        for tactic in ladder.applicable(action) {
            attempts += 1;
            debug!(
                action_id = %clock.action_id(),
                action = action.name(),
                tactic = %tactic,
                node = %node,
                "trying tactic"
            );
            match self.attempt(node, action, tactic).await {
                Ok(()) => {
                    info!(
                        action_id = %clock.action_id(),
                        action = action.name(),
                        tactic = %tactic,
                        elapsed_ms = clock.elapsed_ms(),
                        "interaction landed"
                    );
                    return clock
                        .outcome(OutcomeStatus::Succeeded)
                        .with_tactic(tactic);
                }
                Err(AttemptError::Driver(err)) if err.is_stale() => {
                    debug!(action_id = %clock.action_id(), node = %node, "handle went stale");
                    return clock
                        .outcome(OutcomeStatus::ActionFailed)
                        .with_detail(format!("stale handle during {}: {}", tactic, err))
                        .stale();
                }
                Err(err) => {
                    let described = err.describe(tactic);
                    debug!(action_id = %clock.action_id(), error = %described, "tactic failed");
                    last_error = Some(described);
                }
            }
        }

        let detail = match last_error {
            Some(last) => format!("{} tactic(s) exhausted; last error: {}", attempts, last),
            None => format!("no tactic in the ladder applies to {}", action.name()),
        };
        warn!(
            action_id = %clock.action_id(),
            action = action.name(),
            node = %node,
            "{}",
            detail
        );
        clock
            .outcome(OutcomeStatus::ActionFailed)
            .with_detail(detail)
    }
}
