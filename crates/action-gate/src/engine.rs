//! Engine facade
//!
//! Bundles a driver with the engine configuration and scope selectors and hands out the
//! caller-facing operations: resolve, perform, perform-and-verify and wait-for.

use std::sync::Arc;
use std::time::Duration;

use action_locator::{ElementResolver, Intent, Resolution, Resolver, ScopeSelectors, StrategyPlan};
use action_primitives::{
    ActionOutcome, ActionTactic, EngineConfig, Escalator, InteractionAction, Interactor,
    OutcomeStatus, Poller, Stopwatch, TacticLadder,
};
use driver_adapter::Driver;
use tokio::time::Instant;
use tracing::{debug, info};
use uiresolve_core_types::ScopeContext;

use crate::conditions::WaitCondition;
use crate::errors::GateError;
use crate::evaluator::{ConditionEvaluator, Verdict};

/// The engine bound to one browser session.
///
/// Holds no per-page state: every call re-resolves what it acts on. One engine per driver;
/// calls against the same page are expected to run one after another.
#[derive(Clone)]
pub struct Engine {
    driver: Arc<dyn Driver>,
    config: EngineConfig,
    resolver: Resolver,
    evaluator: ConditionEvaluator,
    poller: Poller,
}

/// How the interaction half of an action ended.
pub(crate) enum Acted {
    Landed {
        strategy: String,
        tactic: Option<ActionTactic>,
    },
    Failed(ActionOutcome),
}

impl Engine {
    pub fn new(
        driver: Arc<dyn Driver>,
        config: EngineConfig,
        scopes: ScopeSelectors,
    ) -> Result<Self, GateError> {
        config.validate()?;
        Ok(Self::build(driver, config, scopes))
    }

    /// Default configuration and selectors.
    pub fn with_defaults(driver: Arc<dyn Driver>) -> Self {
        Self::build(driver, EngineConfig::default(), ScopeSelectors::default())
    }

    fn build(driver: Arc<dyn Driver>, mut config: EngineConfig, scopes: ScopeSelectors) -> Self {
        config.apply_settle();
        let resolver = Resolver::new(driver.clone(), scopes)
            .with_poll_policy(config.poll.clone())
            .with_primary_share(config.primary_share);
        Self {
            evaluator: ConditionEvaluator::new(resolver.clone()),
            poller: config.poller(),
            resolver,
            driver,
            config,
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// `resolve(intent, plan, scope)` with the configured resolve budget.
    pub async fn resolve(
        &self,
        intent: &Intent,
        plan: &StrategyPlan,
        scope: &ScopeContext,
    ) -> Result<Resolution, GateError> {
        self.resolve_within(intent, plan, scope, self.config.timeouts.resolve())
            .await
    }

    pub async fn resolve_within(
        &self,
        intent: &Intent,
        plan: &StrategyPlan,
        scope: &ScopeContext,
        budget: Duration,
    ) -> Result<Resolution, GateError> {
        Ok(self.resolver.find_element(intent, plan, scope, budget).await?)
    }

    /// Resolve and interact without checking any post-condition.
    pub async fn perform(
        &self,
        intent: &Intent,
        plan: &StrategyPlan,
        scope: &ScopeContext,
        action: &InteractionAction,
    ) -> Result<ActionOutcome, GateError> {
        let clock = Stopwatch::start();
        let escalator = Escalator::new(self.driver.clone(), self.config.timeouts.tactic());
        let acted = self
            .act(
                &escalator,
                intent,
                plan,
                scope,
                action,
                &self.config.ladder,
                self.config.timeouts.resolve(),
                &clock,
            )
            .await?;
        Ok(match acted {
            Acted::Landed { strategy, tactic } => {
                let outcome = clock.outcome(OutcomeStatus::Succeeded).with_strategy(strategy);
                match tactic {
                    Some(tactic) => outcome.with_tactic(tactic),
                    None => outcome,
                }
            }
            Acted::Failed(outcome) => outcome,
        })
    }

    /// Checks `condition` once; true only when it positively holds.
    pub async fn holds(
        &self,
        condition: &WaitCondition,
        scope: &ScopeContext,
    ) -> Result<bool, GateError> {
        condition.validate()?;
        self.evaluator.evaluate(condition, scope).await
    }

    /// Polls `condition`; `Succeeded` once it holds, `TimedOut` otherwise.
    pub async fn wait_for(
        &self,
        condition: &WaitCondition,
        scope: &ScopeContext,
        timeout: Duration,
    ) -> Result<ActionOutcome, GateError> {
        let clock = Stopwatch::start();
        let verdict = self
            .evaluator
            .wait_until(&self.poller, condition, scope, timeout)
            .await?;
        let outcome = match verdict {
            Verdict::Holds => clock.outcome(OutcomeStatus::Succeeded),
            Verdict::Fails => clock.outcome(OutcomeStatus::TimedOut).with_detail(format!(
                "{} did not hold in {} within {}ms",
                condition,
                scope,
                timeout.as_millis()
            )),
            undecided => clock.outcome(OutcomeStatus::TimedOut).with_detail(format!(
                "{} did not hold in {} within {}ms; last check {}",
                condition,
                scope,
                timeout.as_millis(),
                undecided
            )),
        };
        debug!(
            action_id = %clock.action_id(),
            condition = %condition,
            status = %outcome.status,
            elapsed_ms = outcome.elapsed_ms,
            "wait finished"
        );
        Ok(outcome)
    }

    /// Resolve, then escalate. A stale handle earns exactly one fresh resolution.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn act(
        &self,
        escalator: &Escalator,
        intent: &Intent,
        plan: &StrategyPlan,
        scope: &ScopeContext,
        action: &InteractionAction,
        ladder: &TacticLadder,
        resolve_budget: Duration,
        clock: &Stopwatch,
    ) -> Result<Acted, GateError> {
        let deadline = Instant::now() + resolve_budget;
        let mut re_resolved = false;
        loop {
            let budget = deadline.saturating_duration_since(Instant::now());
            let element = match self.resolver.find_element(intent, plan, scope, budget).await? {
                Resolution::Found(element) => element,
                other => return Ok(Acted::Failed(other.to_outcome(clock))),
            };

            let outcome = escalator
                .perform(&element.handle, action, ladder, clock)
                .await;
            if outcome.succeeded() {
                return Ok(Acted::Landed {
                    strategy: element.matched_strategy,
                    tactic: outcome.tactic_used,
                });
            }
            if outcome.stale_handle && !re_resolved {
                info!(
                    action_id = %clock.action_id(),
                    intent = %intent,
                    node = %element.handle,
                    "handle went stale, resolving again"
                );
                re_resolved = true;
                continue;
            }
            return Ok(Acted::Failed(outcome.with_strategy(element.matched_strategy)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_adapter::{El, MemoryDriver};

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = EngineConfig::default();
        config.poll.interval_ms = 0;
        let result = Engine::new(
            Arc::new(MemoryDriver::new()),
            config,
            ScopeSelectors::default(),
        );
        assert!(matches!(result, Err(GateError::Engine(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn perform_reports_not_found_without_clicking() {
        let driver = MemoryDriver::new();
        let mut config = EngineConfig::default();
        config.timeouts.resolve_ms = 600;
        let engine = Engine::new(Arc::new(driver.clone()), config, ScopeSelectors::default())
            .unwrap();

        let outcome = engine
            .perform(
                &Intent::new("button").labelled("Archive"),
                &StrategyPlan::clickable(),
                &ScopeContext::Page,
                &InteractionAction::Click,
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::NotFound);
        assert!(driver.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_as_an_outcome() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(&root, El::new("div").class("modal show").attr("role", "dialog"));
        let engine = Engine::with_defaults(Arc::new(driver.clone()));

        let outcome = engine
            .wait_for(
                &WaitCondition::absent("[role=\"dialog\"]"),
                &ScopeContext::Page,
                Duration::from_millis(800),
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::TimedOut);
        assert!(outcome.elapsed_ms >= 800);
        assert!(outcome.require().is_err());
    }
}
