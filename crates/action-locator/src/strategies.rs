//! Candidate strategies and strategy plans
//!
//! A plan is data: an ordered list of selector templates plus the scopes each one is valid
//! in. Plans are built once per kind of intent (or loaded from YAML) and reused.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uiresolve_core_types::ScopeKind;

use crate::errors::LocatorError;
use crate::types::{Intent, Target};
use crate::yaml;

const PLACEHOLDERS: [&str; 4] = ["role", "label", "attr_name", "attr_value"];

/// Selector text with `{role}`, `{label}`, `{attr_name}` and `{attr_value}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorTemplate(String);

impl SelectorTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder names in order of appearance. `{{` and `}}` are literal braces.
    fn placeholders(&self) -> Result<Vec<String>, String> {
        let mut names = Vec::new();
        let mut chars = self.0.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(format!("unclosed placeholder in '{}'", self.0)),
                        }
                    }
                    names.push(name);
                }
                '}' => return Err(format!("stray '}}' in '{}'", self.0)),
                _ => {}
            }
        }
        Ok(names)
    }

    /// Fills the placeholders from `intent`; `None` when the intent lacks a value.
    pub fn render(&self, intent: &Intent) -> Option<String> {
        let mut out = String::with_capacity(self.0.len());
        let mut chars = self.0.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                    out.push_str(&fill(&name, intent)?);
                }
                c => out.push(c),
            }
        }
        Some(out)
    }
}

fn fill(name: &str, intent: &Intent) -> Option<String> {
    match (name, &intent.target) {
        ("role", _) => Some(intent.role.clone()),
        ("label", Target::Label { text, .. }) => Some(css_escape(text)),
        ("attr_name", Target::Attribute { name, .. }) => Some(name.clone()),
        ("attr_value", Target::Attribute { value, .. }) => Some(css_escape(value)),
        _ => None,
    }
}

/// Escapes a value for use inside a double-quoted CSS string.
pub fn css_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for SelectorTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One way of finding an intent's element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateStrategy {
    pub id: String,
    /// Lower is tried first.
    pub priority: u32,
    pub selector: SelectorTemplate,
    /// Scope kinds this strategy may run in; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<ScopeKind>,
    /// Drop invisible matches before disambiguating.
    #[serde(default)]
    pub require_visible: bool,
}

impl CandidateStrategy {
    pub fn new(id: impl Into<String>, priority: u32, selector: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority,
            selector: SelectorTemplate::new(selector),
            applies_to: Vec::new(),
            require_visible: false,
        }
    }

    pub fn only_in(mut self, kinds: impl IntoIterator<Item = ScopeKind>) -> Self {
        self.applies_to = kinds.into_iter().collect();
        self
    }

    pub fn visible_only(mut self) -> Self {
        self.require_visible = true;
        self
    }

    /// The concrete selector for `intent` in `scope`, or `None` when this strategy does
    /// not apply there.
    pub fn applies_if(&self, intent: &Intent, scope: ScopeKind) -> Option<String> {
        if !self.applies_to.is_empty() && !self.applies_to.contains(&scope) {
            return None;
        }
        self.selector.render(intent)
    }
}

/// Ordered candidate strategies for one kind of intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPlan {
    #[serde(default)]
    pub name: String,
    pub strategies: Vec<CandidateStrategy>,
}

impl StrategyPlan {
    /// Sorts by priority (stable, so equal priorities keep declaration order).
    pub fn new(name: impl Into<String>, mut strategies: Vec<CandidateStrategy>) -> Self {
        strategies.sort_by_key(|strategy| strategy.priority);
        Self {
            name: name.into(),
            strategies,
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, LocatorError> {
        let plan: StrategyPlan =
            yaml::from_yaml_str(raw).map_err(|err| LocatorError::PlanLoad(err.to_string()))?;
        let plan = StrategyPlan::new(plan.name, plan.strategies);
        plan.validate()?;
        Ok(plan)
    }

    pub fn load(path: &Path) -> Result<Self, LocatorError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| LocatorError::PlanLoad(format!("{}: {}", path.display(), err)))?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.strategies.is_empty() {
            return Err(LocatorError::InvalidPlan(format!(
                "plan '{}' has no strategies",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for strategy in &self.strategies {
            if !seen.insert(strategy.id.as_str()) {
                return Err(LocatorError::InvalidPlan(format!(
                    "duplicate strategy id '{}'",
                    strategy.id
                )));
            }
            let names = strategy
                .selector
                .placeholders()
                .map_err(LocatorError::InvalidPlan)?;
            if let Some(unknown) = names.iter().find(|n| !PLACEHOLDERS.contains(&n.as_str())) {
                return Err(LocatorError::InvalidPlan(format!(
                    "strategy '{}' uses unknown placeholder {{{}}}",
                    strategy.id, unknown
                )));
            }
        }
        Ok(())
    }

    /// Strategies that apply to `intent` in `scope`, paired with their rendered selectors.
    pub fn applicable<'a>(
        &'a self,
        intent: &Intent,
        scope: ScopeKind,
    ) -> Vec<(&'a CandidateStrategy, String)> {
        self.strategies
            .iter()
            .filter_map(|strategy| {
                strategy
                    .applies_if(intent, scope)
                    .map(|selector| (strategy, selector))
            })
            .collect()
    }

    /// Buttons and links: accessible name first, then role markup, then any clickable.
    pub fn clickable() -> Self {
        Self::new(
            "clickable",
            vec![
                CandidateStrategy::new("aria-label", 10, "[aria-label=\"{label}\"]"),
                CandidateStrategy::new("role-tag", 20, "{role}"),
                CandidateStrategy::new("role-attr", 30, "[role=\"{role}\"]"),
                CandidateStrategy::new("generic-clickable", 40, "button, a, [role=\"button\"]"),
            ],
        )
    }

    /// Checkboxes in Angular Material, Bootstrap and plain HTML.
    pub fn checkbox() -> Self {
        Self::new(
            "checkbox",
            vec![
                CandidateStrategy::new("mat-checkbox", 10, "mat-checkbox, .mat-mdc-checkbox"),
                CandidateStrategy::new("form-check", 20, ".form-check"),
                CandidateStrategy::new("role-checkbox", 30, "[role=\"checkbox\"]"),
                CandidateStrategy::new("native-checkbox", 40, "input[type=\"checkbox\"]"),
            ],
        )
    }

    /// Table rows addressed by an id attribute.
    pub fn row_by_attribute() -> Self {
        Self::new(
            "row-by-attribute",
            vec![
                CandidateStrategy::new("row-attr", 10, "tr[{attr_name}=\"{attr_value}\"]"),
                CandidateStrategy::new("mat-row-attr", 20, "mat-row[{attr_name}=\"{attr_value}\"]"),
                CandidateStrategy::new(
                    "role-row-attr",
                    30,
                    "[role=\"row\"][{attr_name}=\"{attr_value}\"]",
                ),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_known_placeholders() {
        let intent = Intent::new("button").labelled("Say \"hi\"");
        let template = SelectorTemplate::new("{role}[aria-label=\"{label}\"]");
        assert_eq!(
            template.render(&intent).as_deref(),
            Some("button[aria-label=\"Say \\\"hi\\\"\"]")
        );
    }

    #[test]
    fn missing_value_makes_strategy_inapplicable() {
        let intent = Intent::new("button");
        let strategy = CandidateStrategy::new("aria", 1, "[aria-label=\"{label}\"]");
        assert_eq!(strategy.applies_if(&intent, ScopeKind::Page), None);
        let plain = CandidateStrategy::new("tag", 2, "{role}").only_in([ScopeKind::Modal]);
        assert_eq!(plain.applies_if(&intent, ScopeKind::Page), None);
        assert_eq!(
            plain.applies_if(&intent, ScopeKind::Modal).as_deref(),
            Some("button")
        );
    }

    #[test]
    fn plan_sorts_and_validates() {
        let plan = StrategyPlan::new(
            "demo",
            vec![
                CandidateStrategy::new("late", 50, "{role}"),
                CandidateStrategy::new("early", 5, "[aria-label=\"{label}\"]"),
            ],
        );
        assert_eq!(plan.strategies[0].id, "early");
        plan.validate().unwrap();

        let bad = StrategyPlan::new("bad", vec![CandidateStrategy::new("x", 1, "{colour}")]);
        assert!(matches!(bad.validate(), Err(LocatorError::InvalidPlan(_))));
        let dup = StrategyPlan::new(
            "dup",
            vec![
                CandidateStrategy::new("x", 1, "a"),
                CandidateStrategy::new("x", 2, "b"),
            ],
        );
        assert!(dup.validate().is_err());
        assert!(StrategyPlan::new("empty", vec![]).validate().is_err());
    }

    #[test]
    fn plan_from_yaml() {
        let plan = StrategyPlan::from_yaml_str(
            r#"
name: headers-button
strategies:
  - id: toolbar-button
    priority: 20
    selector: "button.select-headers"
    applies_to: [table_at, expanded_row]
  - id: aria
    priority: 10
    selector: "[aria-label=\"{label}\"]"
    require_visible: true
"#,
        )
        .unwrap();
        assert_eq!(plan.strategies[0].id, "aria");
        assert!(plan.strategies[0].require_visible);
        assert_eq!(
            plan.strategies[1].applies_to,
            vec![ScopeKind::TableAt, ScopeKind::ExpandedRow]
        );
    }

    #[test]
    fn literal_braces_survive() {
        let template = SelectorTemplate::new("{{x}} {role}");
        assert_eq!(
            template.render(&Intent::new("td")).as_deref(),
            Some("{x} td")
        );
        assert!(template.placeholders().unwrap() == vec!["role".to_string()]);
    }
}
