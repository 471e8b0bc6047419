//! Wait conditions
//!
//! Side-effect-free predicates over the page, safe to re-check on every poll. Element
//! conditions name their element by intent and plan, never by handle, so every check
//! resolves afresh and survives re-renders between polls.

use std::fmt;

use action_locator::{Intent, StrategyPlan};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uiresolve_core_types::ScopeContext;

use crate::errors::GateError;

/// How text is compared. Both sides are whitespace-normalised first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextExpectation {
    Equals(String),
    Contains(String),
    NotEquals(String),
    /// Regular expression searched anywhere in the text
    Matches(String),
}

impl TextExpectation {
    /// Checks `actual` (already normalised) against the expectation.
    pub fn check(&self, actual: &str) -> Result<bool, GateError> {
        Ok(match self {
            TextExpectation::Equals(expected) => actual == normalize(expected),
            TextExpectation::Contains(needle) => actual.contains(&normalize(needle)),
            TextExpectation::NotEquals(expected) => actual != normalize(expected),
            TextExpectation::Matches(pattern) => compile(pattern)?.is_match(actual),
        })
    }
}

fn normalize(raw: &str) -> String {
    action_locator::normalize_ws(raw)
}

fn compile(pattern: &str) -> Result<Regex, GateError> {
    Regex::new(pattern)
        .map_err(|err| GateError::InvalidCondition(format!("bad pattern '{}': {}", pattern, err)))
}

impl fmt::Display for TextExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextExpectation::Equals(text) => write!(f, "== \"{}\"", text),
            TextExpectation::Contains(text) => write!(f, "contains \"{}\"", text),
            TextExpectation::NotEquals(text) => write!(f, "!= \"{}\"", text),
            TextExpectation::Matches(pattern) => write!(f, "=~ /{}/", pattern),
        }
    }
}

/// The element an element condition is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub intent: Intent,
    pub plan: StrategyPlan,
    /// Scope to resolve in; `None` means the scope the condition is evaluated in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeContext>,
}

impl ElementRef {
    pub fn new(intent: Intent, plan: StrategyPlan) -> Self {
        Self {
            intent,
            plan,
            scope: None,
        }
    }

    pub fn in_scope(mut self, scope: ScopeContext) -> Self {
        self.scope = Some(scope);
        self
    }

    pub(crate) fn scope_or<'a>(&'a self, fallback: &'a ScopeContext) -> &'a ScopeContext {
        self.scope.as_ref().unwrap_or(fallback)
    }
}

/// A predicate over an element or over the current scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    Visible(ElementRef),
    /// Holds when the element is invisible or not rendered at all
    Hidden(ElementRef),
    Enabled(ElementRef),
    TextEquals { element: ElementRef, text: String },
    TextContains { element: ElementRef, text: String },
    TextNotEquals { element: ElementRef, text: String },
    /// `value: None` means the attribute must be absent
    AttributeEquals {
        element: ElementRef,
        name: String,
        value: Option<String>,
    },
    AttributeContains {
        element: ElementRef,
        name: String,
        needle: String,
    },

    /// Some node matching the selector lies inside the scope
    Present(String),
    Absent(String),
    CountAtLeast { selector: String, count: usize },
    CountEquals { selector: String, count: usize },
    /// Some in-scope match of the selector has text meeting the expectation
    SelectorText {
        selector: String,
        expect: TextExpectation,
    },

    All(Vec<WaitCondition>),
    Any(Vec<WaitCondition>),
    Not(Box<WaitCondition>),
    /// Evaluates `condition` in `scope` instead of the surrounding scope
    Within {
        scope: ScopeContext,
        condition: Box<WaitCondition>,
    },
}

impl WaitCondition {
    pub fn visible(element: ElementRef) -> Self {
        WaitCondition::Visible(element)
    }

    pub fn hidden(element: ElementRef) -> Self {
        WaitCondition::Hidden(element)
    }

    pub fn text_equals(element: ElementRef, text: impl Into<String>) -> Self {
        WaitCondition::TextEquals {
            element,
            text: text.into(),
        }
    }

    pub fn attribute_equals(
        element: ElementRef,
        name: impl Into<String>,
        value: Option<&str>,
    ) -> Self {
        WaitCondition::AttributeEquals {
            element,
            name: name.into(),
            value: value.map(str::to_string),
        }
    }

    pub fn attribute_contains(
        element: ElementRef,
        name: impl Into<String>,
        needle: impl Into<String>,
    ) -> Self {
        WaitCondition::AttributeContains {
            element,
            name: name.into(),
            needle: needle.into(),
        }
    }

    pub fn present(selector: impl Into<String>) -> Self {
        WaitCondition::Present(selector.into())
    }

    pub fn absent(selector: impl Into<String>) -> Self {
        WaitCondition::Absent(selector.into())
    }

    pub fn count_at_least(selector: impl Into<String>, count: usize) -> Self {
        WaitCondition::CountAtLeast {
            selector: selector.into(),
            count,
        }
    }

    pub fn selector_text(selector: impl Into<String>, expect: TextExpectation) -> Self {
        WaitCondition::SelectorText {
            selector: selector.into(),
            expect,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: WaitCondition) -> Self {
        WaitCondition::Not(Box::new(condition))
    }

    /// Pins this condition to `scope`, e.g. a dropdown panel rendered at page level.
    pub fn within(self, scope: ScopeContext) -> Self {
        WaitCondition::Within {
            scope,
            condition: Box::new(self),
        }
    }

    /// Structural checks that do not need the page: non-empty combinators and selectors,
    /// compilable patterns.
    pub fn validate(&self) -> Result<(), GateError> {
        match self {
            WaitCondition::All(parts) | WaitCondition::Any(parts) => {
                if parts.is_empty() {
                    return Err(GateError::InvalidCondition(format!(
                        "empty {} combinator",
                        self.kind()
                    )));
                }
                parts.iter().try_for_each(WaitCondition::validate)
            }
            WaitCondition::Not(inner) => inner.validate(),
            WaitCondition::Within { scope, condition } => {
                scope
                    .validate()
                    .map_err(|err| GateError::InvalidCondition(err.to_string()))?;
                condition.validate()
            }
            WaitCondition::Present(selector)
            | WaitCondition::Absent(selector)
            | WaitCondition::CountAtLeast { selector, .. }
            | WaitCondition::CountEquals { selector, .. } => non_empty(selector),
            WaitCondition::SelectorText { selector, expect } => {
                non_empty(selector)?;
                if let TextExpectation::Matches(pattern) = expect {
                    compile(pattern)?;
                }
                Ok(())
            }
            WaitCondition::AttributeEquals { name, .. }
            | WaitCondition::AttributeContains { name, .. }
                if name.trim().is_empty() =>
            {
                Err(GateError::InvalidCondition("attribute name must not be empty".into()))
            }
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WaitCondition::Visible(_) => "visible",
            WaitCondition::Hidden(_) => "hidden",
            WaitCondition::Enabled(_) => "enabled",
            WaitCondition::TextEquals { .. } => "text_equals",
            WaitCondition::TextContains { .. } => "text_contains",
            WaitCondition::TextNotEquals { .. } => "text_not_equals",
            WaitCondition::AttributeEquals { .. } => "attribute_equals",
            WaitCondition::AttributeContains { .. } => "attribute_contains",
            WaitCondition::Present(_) => "present",
            WaitCondition::Absent(_) => "absent",
            WaitCondition::CountAtLeast { .. } => "count_at_least",
            WaitCondition::CountEquals { .. } => "count_equals",
            WaitCondition::SelectorText { .. } => "selector_text",
            WaitCondition::All(_) => "all",
            WaitCondition::Any(_) => "any",
            WaitCondition::Not(_) => "not",
            WaitCondition::Within { .. } => "within",
        }
    }
}

fn non_empty(selector: &str) -> Result<(), GateError> {
    if selector.trim().is_empty() {
        return Err(GateError::InvalidCondition("selector must not be empty".into()));
    }
    Ok(())
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Visible(el) => write!(f, "{} visible", el.intent),
            WaitCondition::Hidden(el) => write!(f, "{} hidden", el.intent),
            WaitCondition::Enabled(el) => write!(f, "{} enabled", el.intent),
            WaitCondition::TextEquals { element, text } => {
                write!(f, "text of {} == \"{}\"", element.intent, text)
            }
            WaitCondition::TextContains { element, text } => {
                write!(f, "text of {} contains \"{}\"", element.intent, text)
            }
            WaitCondition::TextNotEquals { element, text } => {
                write!(f, "text of {} != \"{}\"", element.intent, text)
            }
            WaitCondition::AttributeEquals {
                element,
                name,
                value: Some(value),
            } => write!(f, "{}[{}] == \"{}\"", element.intent, name, value),
            WaitCondition::AttributeEquals {
                element,
                name,
                value: None,
            } => write!(f, "{}[{}] absent", element.intent, name),
            WaitCondition::AttributeContains {
                element,
                name,
                needle,
            } => write!(f, "{}[{}] contains \"{}\"", element.intent, name, needle),
            WaitCondition::Present(selector) => write!(f, "'{}' present", selector),
            WaitCondition::Absent(selector) => write!(f, "'{}' absent", selector),
            WaitCondition::CountAtLeast { selector, count } => {
                write!(f, "count('{}') >= {}", selector, count)
            }
            WaitCondition::CountEquals { selector, count } => {
                write!(f, "count('{}') == {}", selector, count)
            }
            WaitCondition::SelectorText { selector, expect } => {
                write!(f, "text of '{}' {}", selector, expect)
            }
            WaitCondition::All(parts) => write_joined(f, parts, " && "),
            WaitCondition::Any(parts) => write_joined(f, parts, " || "),
            WaitCondition::Not(inner) => write!(f, "!({})", inner),
            WaitCondition::Within { scope, condition } => write!(f, "{} in {}", condition, scope),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[WaitCondition], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", part)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkbox() -> ElementRef {
        ElementRef::new(Intent::new("checkbox").labelled("Credit"), StrategyPlan::checkbox())
    }

    #[test]
    fn text_expectations() {
        assert!(TextExpectation::Equals(" 1 - 10  of 42".into())
            .check("1 - 10 of 42")
            .unwrap());
        assert!(TextExpectation::Contains("of 42".into()).check("1 - 10 of 42").unwrap());
        assert!(TextExpectation::NotEquals("1 - 10 of 42".into())
            .check("11 - 20 of 42")
            .unwrap());
        assert!(TextExpectation::Matches(r"^\d+ - \d+ of \d+$".into())
            .check("11 - 20 of 42")
            .unwrap());
        assert!(TextExpectation::Matches("(".into()).check("x").is_err());
    }

    #[test]
    fn validation_rejects_unusable_conditions() {
        assert!(WaitCondition::All(vec![]).validate().is_err());
        assert!(WaitCondition::present("  ").validate().is_err());
        assert!(WaitCondition::not(WaitCondition::selector_text(
            ".range",
            TextExpectation::Matches("[".into())
        ))
        .validate()
        .is_err());
        assert!(WaitCondition::attribute_equals(checkbox(), "", Some("true"))
            .validate()
            .is_err());
        assert!(WaitCondition::Any(vec![
            WaitCondition::visible(checkbox()),
            WaitCondition::absent(".mat-select-panel"),
        ])
        .validate()
        .is_ok());
    }

    #[test]
    fn display_reads_like_the_check() {
        let cond = WaitCondition::All(vec![
            WaitCondition::attribute_contains(checkbox(), "class", "checked"),
            WaitCondition::absent(".cdk-overlay-backdrop"),
        ]);
        assert_eq!(
            cond.to_string(),
            "(checkbox \"Credit\"[class] contains \"checked\" && '.cdk-overlay-backdrop' absent)"
        );
    }

    #[test]
    fn conditions_read_from_yaml() {
        let cond: WaitCondition = action_locator::from_yaml_str(
            r#"
count_at_least:
  selector: "tr.mat-row"
  count: 3
"#,
        )
        .unwrap();
        assert_eq!(cond, WaitCondition::count_at_least("tr.mat-row", 3));
    }
}
