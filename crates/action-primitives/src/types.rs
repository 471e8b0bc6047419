//! Core data types for actions and their outcomes

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use driver_adapter::Key;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uiresolve_core_types::ActionId;

use crate::errors::EngineError;

/// Closed set of results a caller branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    /// Element or scoped widget absent; usually transient.
    NotFound,
    /// Condition never became true within budget.
    TimedOut,
    /// Every interaction tactic was exhausted.
    ActionFailed,
    /// More than one candidate and no rule picked one. A defect signal.
    AmbiguousMatch,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::NotFound => "not_found",
            OutcomeStatus::TimedOut => "timed_out",
            OutcomeStatus::ActionFailed => "action_failed",
            OutcomeStatus::AmbiguousMatch => "ambiguous_match",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of every engine operation that acts on or waits for the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: OutcomeStatus,

    /// Strategy that resolved the element, when resolution happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<String>,

    /// Tactic that landed the interaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tactic_used: Option<ActionTactic>,

    pub elapsed_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Set when the interaction failed because the handle went stale
    #[serde(default)]
    pub stale_handle: bool,

    pub action_id: ActionId,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy_used = Some(strategy.into());
        self
    }

    pub fn with_tactic(mut self, tactic: ActionTactic) -> Self {
        self.tactic_used = Some(tactic);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn stale(mut self) -> Self {
        self.stale_handle = true;
        self
    }

    /// Turns anything but `Succeeded` into [`EngineError::Required`].
    pub fn require(self) -> Result<Self, EngineError> {
        if self.succeeded() {
            return Ok(self);
        }
        Err(EngineError::Required {
            status: self.status,
            detail: self
                .detail
                .clone()
                .unwrap_or_else(|| "no detail".to_string()),
        })
    }
}

/// Measures one logical action and stamps its outcome.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    action_id: ActionId,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self::with_id(ActionId::new())
    }

    pub fn with_id(action_id: ActionId) -> Self {
        Self {
            action_id,
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn action_id(&self) -> &ActionId {
        &self.action_id
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn outcome(&self, status: OutcomeStatus) -> ActionOutcome {
        ActionOutcome {
            status,
            strategy_used: None,
            tactic_used: None,
            elapsed_ms: self.elapsed_ms(),
            detail: None,
            stale_handle: false,
            action_id: self.action_id.clone(),
            started_at: self.started_at,
        }
    }
}

/// What to do to a resolved element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum InteractionAction {
    Click,
    Type(String),
    SelectOption(String),
    Press(Key),
    /// Close whatever the element belongs to (dropdown panel, dialog).
    Dismiss,
}

impl InteractionAction {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionAction::Click => "click",
            InteractionAction::Type(_) => "type",
            InteractionAction::SelectOption(_) => "select_option",
            InteractionAction::Press(_) => "press",
            InteractionAction::Dismiss => "dismiss",
        }
    }

    /// Key that stands in for this action when pointer input fails.
    pub fn keyboard_equivalent(&self) -> Option<Key> {
        match self {
            InteractionAction::Click => Some(Key::Enter),
            InteractionAction::Dismiss => Some(Key::Escape),
            InteractionAction::Press(key) => Some(*key),
            InteractionAction::Type(_) | InteractionAction::SelectOption(_) => None,
        }
    }
}

/// One rung of the fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTactic {
    ScrollThenNative,
    /// Wait this many milliseconds, then retry natively.
    SettleThenNative(u64),
    /// DOM-level dispatch that bypasses hit-testing.
    Synthetic,
    KeyboardEquivalent,
}

impl ActionTactic {
    pub fn name(&self) -> &'static str {
        match self {
            ActionTactic::ScrollThenNative => "scroll_then_native",
            ActionTactic::SettleThenNative(_) => "settle_then_native",
            ActionTactic::Synthetic => "synthetic",
            ActionTactic::KeyboardEquivalent => "keyboard_equivalent",
        }
    }

    pub fn applies_to(&self, action: &InteractionAction) -> bool {
        match self {
            ActionTactic::ScrollThenNative | ActionTactic::SettleThenNative(_) => true,
            ActionTactic::Synthetic => matches!(action, InteractionAction::Click),
            ActionTactic::KeyboardEquivalent => action.keyboard_equivalent().is_some(),
        }
    }
}

impl fmt::Display for ActionTactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTactic::SettleThenNative(ms) => write!(f, "{}({}ms)", self.name(), ms),
            other => f.write_str(other.name()),
        }
    }
}

/// Ordered tactics tried until one lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TacticLadder(Vec<ActionTactic>);

pub const DEFAULT_SETTLE_MS: u64 = 300;

impl TacticLadder {
    pub fn new(tactics: Vec<ActionTactic>) -> Self {
        Self(tactics)
    }

    /// Scroll+native, settle+native, synthetic, keyboard.
    pub fn full() -> Self {
        Self::with_settle(DEFAULT_SETTLE_MS)
    }

    pub fn with_settle(settle_ms: u64) -> Self {
        Self(vec![
            ActionTactic::ScrollThenNative,
            ActionTactic::SettleThenNative(settle_ms),
            ActionTactic::Synthetic,
            ActionTactic::KeyboardEquivalent,
        ])
    }

    /// Same rungs, with every settle delay set to `settle_ms`.
    pub fn resettled(&self, settle_ms: u64) -> Self {
        Self(
            self.0
                .iter()
                .map(|tactic| match tactic {
                    ActionTactic::SettleThenNative(_) => ActionTactic::SettleThenNative(settle_ms),
                    other => *other,
                })
                .collect(),
        )
    }

    /// Only the plain native attempt.
    pub fn native_only() -> Self {
        Self(vec![ActionTactic::ScrollThenNative])
    }

    pub fn tactics(&self) -> &[ActionTactic] {
        &self.0
    }

    pub fn applicable<'a>(
        &'a self,
        action: &'a InteractionAction,
    ) -> impl Iterator<Item = ActionTactic> + 'a {
        self.0
            .iter()
            .copied()
            .filter(move |tactic| tactic.applies_to(action))
    }
}

impl Default for TacticLadder {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_mapping() {
        assert_eq!(InteractionAction::Click.keyboard_equivalent(), Some(Key::Enter));
        assert_eq!(InteractionAction::Dismiss.keyboard_equivalent(), Some(Key::Escape));
        assert_eq!(
            InteractionAction::Press(Key::Tab).keyboard_equivalent(),
            Some(Key::Tab)
        );
        assert_eq!(
            InteractionAction::Type("x".into()).keyboard_equivalent(),
            None
        );
    }

    #[test]
    fn synthetic_only_for_clicks() {
        let ladder = TacticLadder::full();
        let typed = InteractionAction::Type("abc".into());
        let applicable: Vec<_> = ladder.applicable(&typed).collect();
        assert_eq!(
            applicable,
            vec![
                ActionTactic::ScrollThenNative,
                ActionTactic::SettleThenNative(DEFAULT_SETTLE_MS)
            ]
        );
        assert_eq!(ladder.applicable(&InteractionAction::Click).count(), 4);
        assert_eq!(ladder.applicable(&InteractionAction::Dismiss).count(), 3);
    }

    #[test]
    fn require_maps_failures() {
        let clock = Stopwatch::start();
        assert!(clock.outcome(OutcomeStatus::Succeeded).require().is_ok());
        let err = clock
            .outcome(OutcomeStatus::NotFound)
            .with_detail("no match in table[3]")
            .require()
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Required {
                status: OutcomeStatus::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn outcome_serializes_for_reports() {
        let outcome = Stopwatch::start()
            .outcome(OutcomeStatus::Succeeded)
            .with_strategy("aria-label")
            .with_tactic(ActionTactic::Synthetic);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["strategy_used"], "aria-label");
        assert_eq!(json["tactic_used"], "synthetic");
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn ladder_yaml_shape() {
        let ladder: TacticLadder =
            serde_json::from_str(r#"["synthetic", {"settle_then_native": 150}]"#).unwrap();
        assert_eq!(
            ladder.tactics(),
            &[ActionTactic::Synthetic, ActionTactic::SettleThenNative(150)]
        );
    }
}
