//! Verified actions
//!
//! Resolve, act, then poll the post-condition under its own smaller budget, and fold all of
//! it into one [`ActionOutcome`]. The post-condition is also checked before anything else,
//! so replaying a verified action whose effect is already in place is a no-op. A check that
//! cannot tell which element it is about reports `AmbiguousMatch` before anything is clicked.

use async_trait::async_trait;
use action_primitives::{ActionOutcome, Escalator, OutcomeStatus, Stopwatch};
use tracing::{info, warn};

use crate::engine::{Acted, Engine};
use crate::errors::GateError;
use crate::evaluator::Verdict;
use crate::types::VerifiedAction;

/// Caller-facing contract for verified actions.
#[async_trait]
pub trait ActionGate: Send + Sync {
    /// `performAndVerify(intent, plan, scope, action, postCondition, timeouts)`.
    async fn perform_and_verify(&self, request: &VerifiedAction) -> Result<ActionOutcome, GateError>;
}

#[async_trait]
impl ActionGate for Engine {
    async fn perform_and_verify(&self, request: &VerifiedAction) -> Result<ActionOutcome, GateError> {
        let clock = Stopwatch::start();
        let timeouts = request.timeouts.unwrap_or(self.config().timeouts);
        let ladder = request.ladder.as_ref().unwrap_or(&self.config().ladder);
        let scope = &request.scope;

        request.intent.validate(scope)?;
        request.post_condition.validate()?;

        match self.evaluator().check(&request.post_condition, scope).await? {
            Verdict::Holds => {
                info!(
                    action_id = %clock.action_id(),
                    intent = %request.intent,
                    condition = %request.post_condition,
                    "post-condition already satisfied"
                );
                return Ok(clock
                    .outcome(OutcomeStatus::Succeeded)
                    .with_detail("already satisfied"));
            }
            Verdict::Ambiguous {
                strategy, detail, ..
            } => {
                warn!(
                    action_id = %clock.action_id(),
                    intent = %request.intent,
                    condition = %request.post_condition,
                    detail = %detail,
                    "post-condition element is ambiguous"
                );
                return Ok(clock
                    .outcome(OutcomeStatus::AmbiguousMatch)
                    .with_strategy(strategy)
                    .with_detail(format!(
                        "post-condition {} cannot be checked: {}",
                        request.post_condition, detail
                    )));
            }
            Verdict::Fails | Verdict::Unknown(_) => {}
        }

        let escalator = Escalator::new(self.driver().clone(), timeouts.tactic());
        let acted = self
            .act(
                &escalator,
                &request.intent,
                &request.plan,
                scope,
                &request.action,
                ladder,
                timeouts.resolve(),
                &clock,
            )
            .await?;
        let (strategy, tactic) = match acted {
            Acted::Landed { strategy, tactic } => (strategy, tactic),
            Acted::Failed(outcome) => {
                warn!(
                    action_id = %clock.action_id(),
                    intent = %request.intent,
                    status = %outcome.status,
                    detail = outcome.detail.as_deref().unwrap_or(""),
                    "verified action did not reach the page"
                );
                return Ok(outcome);
            }
        };

        let verdict = self
            .evaluator()
            .wait_until(self.poller(), &request.post_condition, scope, timeouts.verify())
            .await?;
        let outcome = match verdict {
            Verdict::Holds => clock
                .outcome(OutcomeStatus::Succeeded)
                .with_detail(format!("verified {}", request.post_condition)),
            Verdict::Fails => clock.outcome(OutcomeStatus::TimedOut).with_detail(format!(
                "{} landed but {} did not hold within {}ms",
                request.action.name(),
                request.post_condition,
                timeouts.verify_ms
            )),
            undecided => clock.outcome(OutcomeStatus::TimedOut).with_detail(format!(
                "{} landed but {} did not hold within {}ms; last check {}",
                request.action.name(),
                request.post_condition,
                timeouts.verify_ms,
                undecided
            )),
        };
        let outcome = outcome.with_strategy(strategy);
        let outcome = match tactic {
            Some(tactic) => outcome.with_tactic(tactic),
            None => outcome,
        };

        info!(
            action_id = %clock.action_id(),
            intent = %request.intent,
            status = %outcome.status,
            strategy = outcome.strategy_used.as_deref().unwrap_or(""),
            tactic = outcome.tactic_used.map(|t| t.name()).unwrap_or(""),
            elapsed_ms = outcome.elapsed_ms,
            "verified action finished"
        );
        Ok(outcome)
    }
}
