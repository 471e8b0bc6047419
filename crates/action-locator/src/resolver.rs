//! Candidate strategy resolution
//!
//! Walks a [`StrategyPlan`] in priority order. Each applicable strategy gets a slice of the
//! overall budget (the first one the majority, fallbacks an even split of the rest) and is
//! polled within it: query, narrow to scope, filter by target, then demand exactly one node
//! or an in-range ordinal. A strategy that keeps matching several nodes is recorded as
//! ambiguous and the next one is tried; ambiguity is never settled by taking the first match.

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{PollPolicy, Poller};
use async_trait::async_trait;
use driver_adapter::{Driver, DriverError, DriverErrorKind};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uiresolve_core_types::{NodeHandle, ScopeContext};

use crate::errors::LocatorError;
use crate::scope::{Boundary, ScopeResolver, ScopeSelectors};
use crate::strategies::{CandidateStrategy, StrategyPlan};
use crate::types::{normalize_ws, Intent, Resolution, ResolvedElement, Target};

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// `findElement(intent, plan, scope, budget)`.
    async fn find_element(
        &self,
        intent: &Intent,
        plan: &StrategyPlan,
        scope: &ScopeContext,
        budget: Duration,
    ) -> Result<Resolution, LocatorError>;
}

/// Outcome of one strategy attempt.
#[derive(Debug)]
enum Attempt {
    Unique(NodeHandle),
    Ambiguous(usize),
    Miss(String),
    /// The driver failed mid-check; absence was not observed.
    Unreadable(String),
}

/// Default resolver over a driver.
#[derive(Clone)]
pub struct Resolver {
    driver: Arc<dyn Driver>,
    scopes: ScopeResolver,
    poller: Poller,
    primary_share: f64,
}

impl Resolver {
    pub fn new(driver: Arc<dyn Driver>, selectors: ScopeSelectors) -> Self {
        Self {
            scopes: ScopeResolver::new(driver.clone(), selectors),
            driver,
            poller: Poller::default(),
            primary_share: 0.6,
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poller = Poller::new(policy);
        self
    }

    /// Share of the budget handed to the first applicable strategy when others follow.
    pub fn with_primary_share(mut self, share: f64) -> Self {
        self.primary_share = share.clamp(0.05, 1.0);
        self
    }

    pub fn scopes(&self) -> &ScopeResolver {
        &self.scopes
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Budget for the strategy at `position` among `total` applicable ones.
    fn slice(&self, remaining: Duration, position: usize, total: usize) -> Duration {
        let left = total - position;
        if left <= 1 {
            remaining
        } else if position == 0 {
            let ms = (remaining.as_millis() as f64 * self.primary_share).round() as u64;
            Duration::from_millis(ms)
        } else {
            remaining / left as u32
        }
    }

    async fn attempt(
        &self,
        intent: &Intent,
        strategy: &CandidateStrategy,
        selector: &str,
        scope: &ScopeContext,
    ) -> Result<Attempt, LocatorError> {
        match self.try_strategy(intent, strategy, selector, scope).await {
            Ok(attempt) => Ok(attempt),
            Err(err) => match LocatorError::from_driver(&strategy.id, &err) {
                Some(fatal) => Err(fatal),
                // Both are retried next poll; only a vanished node counts as a miss.
                None if err.kind == DriverErrorKind::StaleHandle => Ok(Attempt::Miss(err.to_string())),
                None => Ok(Attempt::Unreadable(err.to_string())),
            },
        }
    }

    async fn try_strategy(
        &self,
        intent: &Intent,
        strategy: &CandidateStrategy,
        selector: &str,
        scope: &ScopeContext,
    ) -> Result<Attempt, DriverError> {
        let raw = self.driver.query(selector).await?;
        if raw.is_empty() {
            return Ok(Attempt::Miss(format!("'{}' matched nothing", selector)));
        }
        let boundary = self.scopes.boundary(scope).await?;
        let scoped = match self.scopes.filter(scope, &boundary, raw).await? {
            Some(scoped) => scoped,
            None => {
                let reason = match boundary {
                    Boundary::Absent(reason) => reason,
                    _ => format!("{} unavailable", scope),
                };
                return Ok(Attempt::Miss(reason));
            }
        };

        let mut kept = Vec::with_capacity(scoped.len());
        for node in scoped {
            if !self.target_matches(&intent.target, &node).await? {
                continue;
            }
            if strategy.require_visible && !self.driver.is_visible(&node).await? {
                continue;
            }
            kept.push(node);
        }

        if let Some(ordinal) = intent.ordinal {
            let count = kept.len();
            return Ok(match kept.into_iter().nth(ordinal) {
                Some(node) => Attempt::Unique(node),
                None => Attempt::Miss(format!(
                    "ordinal {} out of range ({} match(es) in {})",
                    ordinal, count, scope
                )),
            });
        }
        Ok(match kept.len() {
            0 => Attempt::Miss(format!("no match for {} in {}", intent, scope)),
            1 => Attempt::Unique(kept.remove(0)),
            n => Attempt::Ambiguous(n),
        })
    }

    async fn target_matches(&self, target: &Target, node: &NodeHandle) -> Result<bool, DriverError> {
        match target {
            Target::Any => Ok(true),
            Target::Attribute { name, value } => {
                Ok(self.driver.attribute(node, name).await?.as_deref() == Some(value.as_str()))
            }
            Target::Label { text, exact } => {
                let wanted = normalize_ws(text);
                let mut labels = Vec::with_capacity(3);
                labels.push(self.driver.attribute(node, "aria-label").await?);
                labels.push(self.driver.text(node).await?);
                labels.push(self.driver.attribute(node, "title").await?);
                Ok(labels
                    .into_iter()
                    .flatten()
                    .any(|label| label_matches(&normalize_ws(&label), &wanted, *exact)))
            }
        }
    }
}

fn label_matches(candidate: &str, wanted: &str, exact: bool) -> bool {
    if exact {
        candidate == wanted
    } else {
        candidate.to_lowercase().contains(&wanted.to_lowercase())
    }
}

#[async_trait]
impl ElementResolver for Resolver {
    async fn find_element(
        &self,
        intent: &Intent,
        plan: &StrategyPlan,
        scope: &ScopeContext,
        budget: Duration,
    ) -> Result<Resolution, LocatorError> {
        intent.validate(scope)?;
        if plan.strategies.is_empty() {
            return Err(LocatorError::InvalidPlan(format!(
                "plan '{}' has no strategies",
                plan.name
            )));
        }

        let applicable = plan.applicable(intent, scope.kind());
        if applicable.is_empty() {
            debug!(intent = %intent, scope = %scope, plan = %plan.name, "no applicable strategy");
            return Ok(Resolution::NotFound {
                detail: format!("no strategy in '{}' applies to {} in {}", plan.name, intent, scope),
                unreadable: false,
            });
        }

        let deadline = Instant::now() + budget;
        let total = applicable.len();
        let mut ambiguity: Option<(String, usize)> = None;
        let mut last_miss = String::new();
        let mut unreadable = false;

        for (position, (strategy, selector)) in applicable.iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let slice = self.slice(remaining, position, total);
            debug!(
                intent = %intent,
                strategy = %strategy.id,
                selector = %selector,
                slice_ms = slice.as_millis() as u64,
                "trying strategy"
            );

            let mut session = self.poller.session(slice);
            let mut read_failed = false;
            while session.next_attempt().await {
                match self.attempt(intent, strategy, selector, scope).await? {
                    Attempt::Unique(handle) => {
                        info!(
                            intent = %intent,
                            strategy = %strategy.id,
                            scope = %scope,
                            node = %handle,
                            attempts = session.attempts(),
                            "element resolved"
                        );
                        return Ok(Resolution::Found(ResolvedElement {
                            handle,
                            matched_strategy: strategy.id.clone(),
                            scope: scope.clone(),
                        }));
                    }
                    Attempt::Ambiguous(count) => {
                        warn!(
                            intent = %intent,
                            strategy = %strategy.id,
                            scope = %scope,
                            matches = count,
                            "ambiguous match without disambiguation rule"
                        );
                        if ambiguity.is_none() {
                            ambiguity = Some((strategy.id.clone(), count));
                        }
                        break;
                    }
                    Attempt::Miss(reason) => {
                        read_failed = false;
                        last_miss = reason;
                    }
                    Attempt::Unreadable(reason) => {
                        read_failed = true;
                        last_miss = reason;
                    }
                }
            }
            unreadable |= read_failed;
        }

        if let Some((strategy, matches)) = ambiguity {
            return Ok(Resolution::Ambiguous {
                detail: format!(
                    "strategy '{}' matched {} nodes for {} in {}; add an ordinal or a narrower target",
                    strategy, matches, intent, scope
                ),
                strategy,
                matches,
            });
        }
        debug!(intent = %intent, scope = %scope, reason = %last_miss, "resolution exhausted");
        Ok(Resolution::NotFound {
            detail: format!(
                "{} not found in {} after {} strateg{}: {}",
                intent,
                scope,
                total,
                if total == 1 { "y" } else { "ies" },
                last_miss
            ),
            unreadable,
        })
    }
}
