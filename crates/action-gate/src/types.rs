//! Request types for verified actions

use action_locator::{Intent, StrategyPlan};
use action_primitives::{InteractionAction, TacticLadder, VerifiedActionTimeouts};
use serde::{Deserialize, Serialize};
use uiresolve_core_types::ScopeContext;

use crate::conditions::WaitCondition;

/// Everything one verified action needs: what to act on, how, and how to tell it worked.
///
/// Built per call site; nothing in it refers to a live node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedAction {
    pub intent: Intent,
    pub plan: StrategyPlan,
    #[serde(default)]
    pub scope: ScopeContext,
    pub action: InteractionAction,
    pub post_condition: WaitCondition,
    /// Overrides the engine's ladder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ladder: Option<TacticLadder>,
    /// Overrides the engine's timeouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<VerifiedActionTimeouts>,
}

impl VerifiedAction {
    pub fn new(
        intent: Intent,
        plan: StrategyPlan,
        scope: ScopeContext,
        action: InteractionAction,
        post_condition: WaitCondition,
    ) -> Self {
        Self {
            intent,
            plan,
            scope,
            action,
            post_condition,
            ladder: None,
            timeouts: None,
        }
    }

    /// Click, then wait for `post_condition`.
    pub fn click(
        intent: Intent,
        plan: StrategyPlan,
        scope: ScopeContext,
        post_condition: WaitCondition,
    ) -> Self {
        Self::new(intent, plan, scope, InteractionAction::Click, post_condition)
    }

    pub fn with_ladder(mut self, ladder: TacticLadder) -> Self {
        self.ladder = Some(ladder);
        self
    }

    pub fn with_timeouts(mut self, timeouts: VerifiedActionTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_from_yaml_with_defaults() {
        let request: VerifiedAction = action_locator::from_yaml_str(
            r#"
intent:
  role: button
  target:
    label:
      text: Save
plan:
  name: save
  strategies:
    - id: tag
      priority: 1
      selector: "{role}"
action:
  kind: click
post_condition:
  absent: ".modal.show"
"#,
        )
        .unwrap();
        assert_eq!(request.scope, ScopeContext::Page);
        assert_eq!(request.action, InteractionAction::Click);
        assert_eq!(request.post_condition, WaitCondition::absent(".modal.show"));
        assert!(request.ladder.is_none());
    }
}
