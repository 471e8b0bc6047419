//! Condition evaluation against the live page
//!
//! A reading is a [`Verdict`], not a bool: a page that could not be read, or an element
//! condition whose element matched several nodes, neither holds nor fails. `Not` keeps such
//! readings undecided, so a transient driver failure can never verify a negation.

use std::fmt;
use std::time::Duration;

use action_locator::{ElementResolver, Resolution, Resolver};
use action_primitives::Poller;
use driver_adapter::{DriverError, DriverErrorKind};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, trace};
use uiresolve_core_types::{NodeHandle, ScopeContext};

use crate::conditions::{ElementRef, TextExpectation, WaitCondition};
use crate::errors::GateError;

/// One reading of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Holds,
    Fails,
    /// The driver failed while reading the page
    Unknown(String),
    /// An element condition's element matched several nodes
    Ambiguous {
        strategy: String,
        matches: usize,
        detail: String,
    },
}

impl Verdict {
    pub fn holds(&self) -> bool {
        matches!(self, Verdict::Holds)
    }

    /// Neither holds nor fails.
    pub fn is_undecided(&self) -> bool {
        matches!(self, Verdict::Unknown(_) | Verdict::Ambiguous { .. })
    }

    fn negate(self) -> Self {
        match self {
            Verdict::Holds => Verdict::Fails,
            Verdict::Fails => Verdict::Holds,
            undecided => undecided,
        }
    }
}

impl From<bool> for Verdict {
    fn from(held: bool) -> Self {
        if held {
            Verdict::Holds
        } else {
            Verdict::Fails
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Holds => f.write_str("holds"),
            Verdict::Fails => f.write_str("fails"),
            Verdict::Unknown(reason) => write!(f, "unknown ({})", reason),
            Verdict::Ambiguous { detail, .. } => write!(f, "ambiguous ({})", detail),
        }
    }
}

/// Evaluates [`WaitCondition`]s once, or repeatedly until they hold.
#[derive(Clone)]
pub struct ConditionEvaluator {
    resolver: Resolver,
}

impl ConditionEvaluator {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// One reading. Only unusable conditions are errors.
    pub fn check<'a>(
        &'a self,
        condition: &'a WaitCondition,
        scope: &'a ScopeContext,
    ) -> BoxFuture<'a, Result<Verdict, GateError>> {
        async move {
            let verdict = match condition {
                // A failing part decides; otherwise the first undecided part does.
                WaitCondition::All(parts) => {
                    let mut undecided = None;
                    for part in parts {
                        match self.check(part, scope).await? {
                            Verdict::Holds => {}
                            Verdict::Fails => return Ok(Verdict::Fails),
                            other => {
                                undecided.get_or_insert(other);
                            }
                        }
                    }
                    undecided.unwrap_or(Verdict::Holds)
                }
                WaitCondition::Any(parts) => {
                    let mut undecided = None;
                    for part in parts {
                        match self.check(part, scope).await? {
                            Verdict::Holds => return Ok(Verdict::Holds),
                            Verdict::Fails => {}
                            other => {
                                undecided.get_or_insert(other);
                            }
                        }
                    }
                    undecided.unwrap_or(Verdict::Fails)
                }
                WaitCondition::Not(inner) => self.check(inner, scope).await?.negate(),
                WaitCondition::Within {
                    scope: pinned,
                    condition: inner,
                } => self.check(inner, pinned).await?,
                leaf => read_failure_as_unknown(condition, self.check_leaf(leaf, scope).await)?,
            };
            trace!(condition = %condition, verdict = %verdict, "condition checked");
            Ok(verdict)
        }
        .boxed()
    }

    /// One reading, true only when the condition positively holds.
    pub async fn evaluate(
        &self,
        condition: &WaitCondition,
        scope: &ScopeContext,
    ) -> Result<bool, GateError> {
        Ok(self.check(condition, scope).await?.holds())
    }

    /// Polls until `condition` holds or `timeout` passes. Returns [`Verdict::Holds`] or the
    /// last reading taken.
    pub async fn wait_until(
        &self,
        poller: &Poller,
        condition: &WaitCondition,
        scope: &ScopeContext,
        timeout: Duration,
    ) -> Result<Verdict, GateError> {
        condition.validate()?;
        let mut session = poller.session(timeout);
        let mut last = Verdict::Fails;
        while session.next_attempt().await {
            last = self.check(condition, scope).await?;
            if last.holds() {
                debug!(
                    condition = %condition,
                    attempts = session.attempts(),
                    elapsed_ms = session.elapsed().as_millis() as u64,
                    "condition holds"
                );
                break;
            }
        }
        Ok(last)
    }

    async fn check_leaf(
        &self,
        condition: &WaitCondition,
        scope: &ScopeContext,
    ) -> Result<Verdict, LeafError> {
        let driver = self.resolver.driver();
        match condition {
            WaitCondition::Present(selector) => {
                Ok((!self.in_scope(selector, scope).await?.is_empty()).into())
            }
            WaitCondition::Absent(selector) => {
                Ok(self.in_scope(selector, scope).await?.is_empty().into())
            }
            WaitCondition::CountAtLeast { selector, count } => {
                Ok((self.in_scope(selector, scope).await?.len() >= *count).into())
            }
            WaitCondition::CountEquals { selector, count } => {
                Ok((self.in_scope(selector, scope).await?.len() == *count).into())
            }
            WaitCondition::SelectorText { selector, expect } => {
                for node in self.in_scope(selector, scope).await? {
                    let text = driver.text(&node).await?.unwrap_or_default();
                    if expect.check(&action_locator::normalize_ws(&text))? {
                        return Ok(Verdict::Holds);
                    }
                }
                Ok(Verdict::Fails)
            }
            WaitCondition::Hidden(element) => match self.locate(element, scope, Verdict::Holds).await? {
                Ok(node) => Ok((!driver.is_visible(&node).await?).into()),
                Err(verdict) => Ok(verdict),
            },
            WaitCondition::Visible(element) => match self.locate(element, scope, Verdict::Fails).await? {
                Ok(node) => Ok(driver.is_visible(&node).await?.into()),
                Err(verdict) => Ok(verdict),
            },
            WaitCondition::Enabled(element) => match self.locate(element, scope, Verdict::Fails).await? {
                Ok(node) => Ok(driver.is_enabled(&node).await?.into()),
                Err(verdict) => Ok(verdict),
            },
            WaitCondition::TextEquals { element, text } => {
                self.element_text(element, scope, &TextExpectation::Equals(text.clone()))
                    .await
            }
            WaitCondition::TextContains { element, text } => {
                self.element_text(element, scope, &TextExpectation::Contains(text.clone()))
                    .await
            }
            WaitCondition::TextNotEquals { element, text } => {
                self.element_text(element, scope, &TextExpectation::NotEquals(text.clone()))
                    .await
            }
            WaitCondition::AttributeEquals {
                element,
                name,
                value,
            } => match self.locate(element, scope, Verdict::Fails).await? {
                Ok(node) => Ok((driver.attribute(&node, name).await? == *value).into()),
                Err(verdict) => Ok(verdict),
            },
            WaitCondition::AttributeContains {
                element,
                name,
                needle,
            } => match self.locate(element, scope, Verdict::Fails).await? {
                Ok(node) => Ok(driver
                    .attribute(&node, name)
                    .await?
                    .map(|value| value.contains(needle.as_str()))
                    .unwrap_or(false)
                    .into()),
                Err(verdict) => Ok(verdict),
            },
            WaitCondition::All(_)
            | WaitCondition::Any(_)
            | WaitCondition::Not(_)
            | WaitCondition::Within { .. } => {
                Err(LeafError::Gate(GateError::InvalidCondition(format!(
                    "{} is not a leaf condition",
                    condition.kind()
                ))))
            }
        }
    }

    async fn element_text(
        &self,
        element: &ElementRef,
        scope: &ScopeContext,
        expect: &TextExpectation,
    ) -> Result<Verdict, LeafError> {
        match self.locate(element, scope, Verdict::Fails).await? {
            Ok(node) => {
                let text = self.resolver.driver().text(&node).await?.unwrap_or_default();
                Ok(expect.check(&action_locator::normalize_ws(&text))?.into())
            }
            Err(verdict) => Ok(verdict),
        }
    }

    /// Zero-wait resolution. `Err` carries the reading to report instead: `when_missing`
    /// for an absent element, [`Verdict::Ambiguous`] for several matches.
    async fn locate(
        &self,
        element: &ElementRef,
        scope: &ScopeContext,
        when_missing: Verdict,
    ) -> Result<Result<NodeHandle, Verdict>, LeafError> {
        let scope = element.scope_or(scope);
        let resolution = self
            .resolver
            .find_element(&element.intent, &element.plan, scope, Duration::ZERO)
            .await
            .map_err(GateError::from)?;
        Ok(match resolution {
            Resolution::Found(found) => Ok(found.handle),
            Resolution::Ambiguous {
                strategy,
                matches,
                detail,
            } => {
                debug!(intent = %element.intent, detail = %detail, "condition element ambiguous");
                Err(Verdict::Ambiguous {
                    strategy,
                    matches,
                    detail: format!("{}: {}", element.intent, detail),
                })
            }
            Resolution::NotFound {
                unreadable: true,
                detail,
            } => Err(Verdict::Unknown(detail)),
            Resolution::NotFound { .. } => Err(when_missing),
        })
    }

    async fn in_scope(
        &self,
        selector: &str,
        scope: &ScopeContext,
    ) -> Result<Vec<NodeHandle>, LeafError> {
        let raw = self.resolver.driver().query(selector).await?;
        Ok(self.resolver.scopes().resolve(scope, raw).await?)
    }
}

enum LeafError {
    Gate(GateError),
    Driver(DriverError),
}

impl From<GateError> for LeafError {
    fn from(err: GateError) -> Self {
        LeafError::Gate(err)
    }
}

impl From<DriverError> for LeafError {
    fn from(err: DriverError) -> Self {
        LeafError::Driver(err)
    }
}

fn read_failure_as_unknown(
    condition: &WaitCondition,
    result: Result<Verdict, LeafError>,
) -> Result<Verdict, GateError> {
    match result {
        Ok(verdict) => Ok(verdict),
        Err(LeafError::Gate(err)) => Err(err),
        Err(LeafError::Driver(err)) if err.kind == DriverErrorKind::InvalidSelector => Err(
            GateError::InvalidCondition(format!("{}: {}", condition, err)),
        ),
        Err(LeafError::Driver(err)) => {
            trace!(condition = %condition, error = %err, "page unreadable while checking");
            Ok(Verdict::Unknown(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::{Intent, ScopeSelectors, StrategyPlan};
    use driver_adapter::{El, MemoryDriver};
    use std::sync::Arc;

    fn evaluator(driver: &MemoryDriver) -> ConditionEvaluator {
        ConditionEvaluator::new(Resolver::new(
            Arc::new(driver.clone()),
            ScopeSelectors::default(),
        ))
    }

    fn save_button() -> ElementRef {
        ElementRef::new(Intent::new("button").labelled("Save"), StrategyPlan::clickable())
    }

    #[tokio::test]
    async fn missing_element_only_satisfies_hidden() {
        let driver = MemoryDriver::new();
        let eval = evaluator(&driver);
        let page = ScopeContext::Page;

        assert!(eval.evaluate(&WaitCondition::hidden(save_button()), &page).await.unwrap());
        assert!(!eval.evaluate(&WaitCondition::visible(save_button()), &page).await.unwrap());
        assert!(!eval
            .evaluate(&WaitCondition::Enabled(save_button()), &page)
            .await
            .unwrap());
        assert!(!eval
            .evaluate(&WaitCondition::text_equals(save_button(), "Save"), &page)
            .await
            .unwrap());
        assert!(!eval
            .evaluate(
                &WaitCondition::attribute_equals(save_button(), "disabled", None),
                &page
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn scope_conditions_count_only_inside_the_scope() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(&root, El::new("table").child(El::new("tr").class("mat-row")));
        driver.mount(
            &root,
            El::new("table")
                .child(El::new("tr").class("mat-row"))
                .child(El::new("tr").class("mat-row")),
        );
        let eval = evaluator(&driver);

        let two = WaitCondition::CountEquals {
            selector: "tr.mat-row".into(),
            count: 2,
        };
        assert!(eval.evaluate(&two, &ScopeContext::TableAt(1)).await.unwrap());
        assert!(!eval.evaluate(&two, &ScopeContext::TableAt(0)).await.unwrap());
        assert!(eval
            .evaluate(&WaitCondition::count_at_least("tr.mat-row", 3), &ScopeContext::Page)
            .await
            .unwrap());
        assert!(eval
            .evaluate(&WaitCondition::absent("tr.mat-row"), &ScopeContext::TableAt(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn combinators_and_attributes() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(
            &root,
            El::new("button").attr("aria-pressed", "true").class("btn active").text("Save"),
        );
        let eval = evaluator(&driver);
        let page = ScopeContext::Page;

        let cond = WaitCondition::All(vec![
            WaitCondition::attribute_equals(save_button(), "aria-pressed", Some("true")),
            WaitCondition::attribute_contains(save_button(), "class", "active"),
            WaitCondition::not(WaitCondition::present(".spinner")),
            WaitCondition::Any(vec![
                WaitCondition::present(".toast"),
                WaitCondition::selector_text("button", TextExpectation::Matches("^Sa".into())),
            ]),
        ]);
        assert!(eval.evaluate(&cond, &page).await.unwrap());
    }

    #[tokio::test]
    async fn unparsable_selector_is_an_error() {
        let driver = MemoryDriver::new();
        let err = evaluator(&driver)
            .evaluate(&WaitCondition::present("div:hover"), &ScopeContext::Page)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidCondition(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_sees_late_changes() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        let spinner = driver.mount(&root, El::new("div").class("spinner"));
        driver.with_dom(|dom| {
            dom.schedule(
                Duration::from_millis(700),
                &spinner,
                Arc::new(|dom: &mut driver_adapter::MemoryDom, node: &NodeHandle| {
                    let _ = dom.remove(node);
                }),
            )
        });
        let eval = evaluator(&driver);
        let poller = Poller::new(action_primitives::PollPolicy::fixed(200));
        let start = tokio::time::Instant::now();

        let gone = eval
            .wait_until(&poller, &WaitCondition::absent(".spinner"), &ScopeContext::Page, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(gone, Verdict::Holds);
        assert!(start.elapsed() < Duration::from_millis(1000));

        let never = eval
            .wait_until(&poller, &WaitCondition::present(".spinner"), &ScopeContext::Page, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(never, Verdict::Fails);
    }

    #[tokio::test]
    async fn duplicate_element_neither_holds_nor_fails() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(&root, El::new("button").text("Save"));
        driver.mount(&root, El::new("button").text("Save"));
        let eval = evaluator(&driver);
        let page = ScopeContext::Page;

        let hidden = WaitCondition::hidden(save_button());
        let verdict = eval.check(&hidden, &page).await.unwrap();
        assert!(matches!(verdict, Verdict::Ambiguous { matches: 2, .. }), "{:?}", verdict);
        assert!(!eval.evaluate(&hidden, &page).await.unwrap());
        assert!(!eval.evaluate(&WaitCondition::not(hidden.clone()), &page).await.unwrap());

        // A decided part still settles a combinator.
        let any = WaitCondition::Any(vec![hidden.clone(), WaitCondition::present("button")]);
        assert_eq!(eval.check(&any, &page).await.unwrap(), Verdict::Holds);
        let all = WaitCondition::All(vec![hidden.clone(), WaitCondition::present(".toast")]);
        assert_eq!(eval.check(&all, &page).await.unwrap(), Verdict::Fails);
        let undecided = WaitCondition::All(vec![hidden, WaitCondition::present("button")]);
        assert!(eval.check(&undecided, &page).await.unwrap().is_undecided());
    }
}
