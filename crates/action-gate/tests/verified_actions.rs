//! Verified actions end to end over the in-memory driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action_gate::{ActionGate, ElementRef, Engine, GateError, VerifiedAction, WaitCondition};
use action_locator::{CandidateStrategy, Intent, ScopeSelectors, StrategyPlan};
use action_primitives::{ActionTactic, EngineConfig, InteractionAction, OutcomeStatus};
use async_trait::async_trait;
use driver_adapter::{
    ClickMode, Driver, DriverError, DriverErrorKind, El, Key, MemoryDriver, NodeHandle,
};
use uiresolve_core_types::{ScopeContext, ScopeKind};

fn engine(driver: Arc<dyn Driver>) -> Engine {
    let mut config = EngineConfig::default();
    config.poll.interval_ms = 100;
    config.poll.max_interval_ms = 100;
    Engine::new(driver, config, ScopeSelectors::default()).unwrap()
}

fn credit_checkbox() -> ElementRef {
    ElementRef::new(
        Intent::new("mat-checkbox").labelled("Credit"),
        StrategyPlan::new("credit", vec![CandidateStrategy::new("tag", 1, "{role}")]),
    )
}

/// A checkbox whose click flips `aria-checked` after a short animation.
fn checkbox_page() -> (MemoryDriver, NodeHandle) {
    let driver = MemoryDriver::new();
    let root = driver.root();
    let checkbox = driver.mount(
        &root,
        El::new("mat-checkbox").attr("aria-checked", "false").text("Credit"),
    );
    driver.on_click(&checkbox, |dom, node| {
        let node = node.clone();
        dom.schedule(
            Duration::from_millis(150),
            &node,
            Arc::new(|dom: &mut driver_adapter::MemoryDom, node: &NodeHandle| {
                let checked = dom.get_attr(node, "aria-checked").as_deref() == Some("true");
                let _ = dom.set_attr(node, "aria-checked", if checked { "false" } else { "true" });
            }),
        );
    });
    (driver, checkbox)
}

fn check_credit() -> VerifiedAction {
    VerifiedAction::click(
        Intent::new("mat-checkbox").labelled("Credit"),
        credit_checkbox().plan,
        ScopeContext::Page,
        WaitCondition::attribute_equals(credit_checkbox(), "aria-checked", Some("true")),
    )
}

#[tokio::test(start_paused = true)]
async fn verified_action_is_idempotent_under_retry() {
    let (driver, checkbox) = checkbox_page();
    let engine = engine(Arc::new(driver.clone()));

    let first = tokio_test::assert_ok!(engine.perform_and_verify(&check_credit()).await);
    assert_eq!(first.status, OutcomeStatus::Succeeded);
    assert_eq!(first.strategy_used.as_deref(), Some("tag"));
    assert_eq!(first.tactic_used, Some(ActionTactic::ScrollThenNative));
    assert_eq!(driver.clicks().len(), 1);

    let second = tokio_test::assert_ok!(engine.perform_and_verify(&check_credit()).await);
    assert_eq!(second.status, OutcomeStatus::Succeeded);
    assert_eq!(second.detail.as_deref(), Some("already satisfied"));
    assert_eq!(second.elapsed_ms, 0);
    assert_eq!(driver.clicks().len(), 1, "second call must not toggle the box back");
    assert_eq!(
        driver.with_dom(|dom| dom.get_attr(&checkbox, "aria-checked")),
        Some("true".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn backdrop_is_bypassed_by_synthetic_click() {
    let driver = MemoryDriver::new();
    let root = driver.root();
    let save = driver.mount(&root, El::new("button").class("save").text("Save"));
    let backdrop = driver.mount(&root, El::new("div").class("cdk-overlay-backdrop"));
    driver.with_dom(|dom| dom.set_overlay(Some(&backdrop))).unwrap();
    driver.on_click(&save, |dom, _| {
        let body = dom.root();
        let _ = dom.append(&body, El::new("div").class("toast").text("Saved"));
    });
    let engine = engine(Arc::new(driver.clone()));

    let request = VerifiedAction::click(
        Intent::new("button").labelled("Save"),
        StrategyPlan::clickable(),
        ScopeContext::Page,
        WaitCondition::present(".toast"),
    );
    let outcome = engine.perform_and_verify(&request).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.tactic_used, Some(ActionTactic::Synthetic));
    let modes: Vec<ClickMode> = driver.clicks().into_iter().map(|(_, mode)| mode).collect();
    assert_eq!(modes, vec![ClickMode::Synthetic]);
}

#[tokio::test(start_paused = true)]
async fn click_that_never_shows_its_effect_times_out() {
    let driver = MemoryDriver::new();
    let root = driver.root();
    driver.mount(&root, El::new("button").text("Export"));
    let engine = engine(Arc::new(driver.clone()));

    let request = VerifiedAction::click(
        Intent::new("button").labelled("Export"),
        StrategyPlan::clickable(),
        ScopeContext::Page,
        WaitCondition::present(".download-ready"),
    );
    let outcome = engine.perform_and_verify(&request).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::TimedOut);
    assert_eq!(outcome.strategy_used.as_deref(), Some("role-tag"));
    assert!(outcome.detail.unwrap().contains("did not hold within 3000ms"));
    assert_eq!(driver.clicks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn absent_target_is_not_found_and_untouched() {
    let driver = MemoryDriver::new();
    let root = driver.root();
    driver.mount(&root, El::new("table"));
    let engine = engine(Arc::new(driver.clone()));

    let request = VerifiedAction::click(
        Intent::new("button").labelled("Select Headers"),
        StrategyPlan::clickable(),
        ScopeContext::TableAt(1),
        WaitCondition::present(".mat-select-panel"),
    );
    let outcome = engine.perform_and_verify(&request).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::NotFound);
    assert!(driver.clicks().is_empty());
}

#[tokio::test]
async fn missing_required_scope_is_a_usage_error() {
    let engine = engine(Arc::new(MemoryDriver::new()));
    let request = VerifiedAction::click(
        Intent::new("button").labelled("Save").within(ScopeKind::Modal),
        StrategyPlan::clickable(),
        ScopeContext::Page,
        WaitCondition::absent("[role=\"dialog\"]"),
    );
    let err = engine.perform_and_verify(&request).await.unwrap_err();
    assert!(matches!(err, GateError::Locator(_)));
}

/// A page that misbehaves on demand: re-renders the next clicked node so the engine's handle
/// goes stale, and fails every query for one selector.
struct FlakyPage {
    inner: MemoryDriver,
    rerender_next_click: AtomicBool,
    unreadable: Option<&'static str>,
}

impl FlakyPage {
    fn new(inner: &MemoryDriver) -> Self {
        Self {
            inner: inner.clone(),
            rerender_next_click: AtomicBool::new(false),
            unreadable: None,
        }
    }
}

#[async_trait]
impl Driver for FlakyPage {
    async fn query(&self, selector: &str) -> Result<Vec<NodeHandle>, DriverError> {
        if self.unreadable == Some(selector) {
            return Err(DriverError::new(DriverErrorKind::Io).with_hint("connection reset"));
        }
        self.inner.query(selector).await
    }
    async fn query_within(&self, root: &NodeHandle, selector: &str) -> Result<Vec<NodeHandle>, DriverError> {
        self.inner.query_within(root, selector).await
    }
    async fn contains(&self, ancestor: &NodeHandle, node: &NodeHandle) -> Result<bool, DriverError> {
        self.inner.contains(ancestor, node).await
    }
    async fn next_sibling(&self, node: &NodeHandle) -> Result<Option<NodeHandle>, DriverError> {
        self.inner.next_sibling(node).await
    }
    async fn is_visible(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        self.inner.is_visible(node).await
    }
    async fn is_enabled(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        self.inner.is_enabled(node).await
    }
    async fn click(&self, node: &NodeHandle, mode: ClickMode) -> Result<(), DriverError> {
        if self.rerender_next_click.swap(false, Ordering::SeqCst) {
            self.inner.with_dom(|dom| dom.rerender(node))?;
        }
        self.inner.click(node, mode).await
    }
    async fn type_text(&self, node: &NodeHandle, text: &str) -> Result<(), DriverError> {
        self.inner.type_text(node, text).await
    }
    async fn select_option(&self, node: &NodeHandle, value: &str) -> Result<(), DriverError> {
        self.inner.select_option(node, value).await
    }
    async fn press_key(&self, node: &NodeHandle, key: Key) -> Result<(), DriverError> {
        self.inner.press_key(node, key).await
    }
    async fn scroll_into_view(&self, node: &NodeHandle) -> Result<(), DriverError> {
        self.inner.scroll_into_view(node).await
    }
    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>, DriverError> {
        self.inner.attribute(node, name).await
    }
    async fn text(&self, node: &NodeHandle) -> Result<Option<String>, DriverError> {
        self.inner.text(node).await
    }
}

#[tokio::test(start_paused = true)]
async fn stale_handle_is_resolved_again_once() {
    let driver = MemoryDriver::new();
    let root = driver.root();
    driver.mount(&root, El::new("button").text("Refresh"));
    let flaky = FlakyPage::new(&driver);
    flaky.rerender_next_click.store(true, Ordering::SeqCst);
    let engine = engine(Arc::new(flaky));

    let outcome = engine
        .perform(
            &Intent::new("button").labelled("Refresh"),
            &StrategyPlan::clickable(),
            &ScopeContext::Page,
            &InteractionAction::Click,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    let clicks = driver.clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(Some(clicks[0].0.clone()), driver.first("button"));
}

#[tokio::test(start_paused = true)]
async fn ambiguous_post_condition_is_reported_before_clicking() {
    let driver = MemoryDriver::new();
    let root = driver.root();
    driver.mount(&root, El::new("button").text("Save"));
    driver.mount(
        &root,
        El::new("div").class("modal").class("show").child(El::new("button").text("Save")),
    );
    let engine = engine(Arc::new(driver.clone()));

    // "Save is gone from the page" cannot be read while two Save buttons are rendered.
    let page_save = ElementRef::new(Intent::new("button").labelled("Save"), StrategyPlan::clickable())
        .in_scope(ScopeContext::Page);
    let request = VerifiedAction::click(
        Intent::new("button").labelled("Save"),
        StrategyPlan::clickable(),
        ScopeContext::Modal,
        WaitCondition::hidden(page_save),
    );
    let outcome = engine.perform_and_verify(&request).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::AmbiguousMatch);
    assert_ne!(outcome.detail.as_deref(), Some("already satisfied"));
    assert!(outcome.strategy_used.is_some());
    assert!(driver.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreadable_page_never_satisfies_a_negation() {
    let driver = MemoryDriver::new();
    let root = driver.root();
    driver.mount(&root, El::new("div").class("toast").text("Saved"));
    let mut flaky = FlakyPage::new(&driver);
    flaky.unreadable = Some(".toast");
    let engine = engine(Arc::new(flaky));
    let page = ScopeContext::Page;

    let no_toast = WaitCondition::not(WaitCondition::present(".toast"));
    assert!(!engine.holds(&no_toast, &page).await.unwrap());
    let toast = ElementRef::new(
        Intent::new("div").labelled("Saved"),
        StrategyPlan::new("toast", vec![CandidateStrategy::new("toast-class", 1, ".toast")]),
    );
    let no_visible_toast = WaitCondition::not(WaitCondition::visible(toast.clone()));
    assert!(!engine.holds(&no_visible_toast, &page).await.unwrap());
    assert!(!engine.holds(&WaitCondition::hidden(toast), &page).await.unwrap());

    let outcome = engine
        .wait_for(&no_toast, &page, Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::TimedOut);
    assert!(outcome.detail.unwrap().contains("last check unknown"));
}
