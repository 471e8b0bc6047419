//! Core types for the locator

use std::fmt;

use action_primitives::{ActionOutcome, OutcomeStatus, Stopwatch};
use serde::{Deserialize, Serialize};
use uiresolve_core_types::{NodeHandle, ScopeContext, ScopeKind};

use crate::errors::LocatorError;
use crate::yaml;

/// What distinguishes the wanted element from others with the same role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Visible text or accessible name. `exact = false` means case-insensitive containment.
    Label {
        text: String,
        #[serde(default = "default_exact")]
        exact: bool,
    },
    /// An attribute carrying this exact value.
    Attribute { name: String, value: String },
    /// No predicate; only the selector, scope and ordinal decide.
    Any,
}

fn default_exact() -> bool {
    true
}

/// Semantic description of the wanted element.
///
/// Says *what* is wanted ("the Save button in the open modal"), never *how* to find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub role: String,
    #[serde(default = "default_target")]
    pub target: Target,
    /// Container kind this intent only makes sense in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ScopeKind>,
    /// 0-based pick among the matches left after scope and target filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<usize>,
}

fn default_target() -> Target {
    Target::Any
}

impl Intent {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            target: Target::Any,
            container: None,
            ordinal: None,
        }
    }

    pub fn labelled(mut self, text: impl Into<String>) -> Self {
        self.target = Target::Label {
            text: text.into(),
            exact: true,
        };
        self
    }

    pub fn label_containing(mut self, text: impl Into<String>) -> Self {
        self.target = Target::Label {
            text: text.into(),
            exact: false,
        };
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.target = Target::Attribute {
            name: name.into(),
            value: value.into(),
        };
        self
    }

    pub fn within(mut self, container: ScopeKind) -> Self {
        self.container = Some(container);
        self
    }

    pub fn nth(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn label(&self) -> Option<&str> {
        match &self.target {
            Target::Label { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Reads an intent document such as `config/intents/save.yaml`.
    pub fn from_yaml_str(raw: &str) -> Result<Self, LocatorError> {
        yaml::from_yaml_str(raw).map_err(|err| LocatorError::IntentLoad(err.to_string()))
    }

    /// Rejects intents that can never resolve and scopes the intent cannot be used in.
    pub fn validate(&self, scope: &ScopeContext) -> Result<(), LocatorError> {
        if self.role.trim().is_empty() {
            return Err(LocatorError::InvalidIntent("role must not be empty".into()));
        }
        match &self.target {
            Target::Label { text, .. } if normalize_ws(text).is_empty() => {
                return Err(LocatorError::InvalidIntent(
                    "label text must not be empty".into(),
                ))
            }
            Target::Attribute { name, .. } if name.trim().is_empty() => {
                return Err(LocatorError::InvalidIntent(
                    "attribute name must not be empty".into(),
                ))
            }
            _ => {}
        }
        scope.validate()?;
        if let Some(required) = self.container {
            if required != scope.kind() {
                return Err(LocatorError::ScopeMismatch {
                    required: required.name().to_string(),
                    supplied: scope.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.role)?;
        match &self.target {
            Target::Label { text, exact: true } => write!(f, " \"{}\"", text)?,
            Target::Label { text, exact: false } => write!(f, " ~\"{}\"", text)?,
            Target::Attribute { name, value } => write!(f, " [{}={}]", name, value)?,
            Target::Any => {}
        }
        if let Some(ordinal) = self.ordinal {
            write!(f, " #{}", ordinal)?;
        }
        Ok(())
    }
}

/// Collapses whitespace runs to single spaces and trims.
pub fn normalize_ws(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A node resolved for one logical operation. Do not keep it past that operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub handle: NodeHandle,
    pub matched_strategy: String,
    pub scope: ScopeContext,
}

/// Result of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedElement),
    /// `unreadable` is set when a strategy's last check failed in the driver, so absence was
    /// never actually observed.
    NotFound { detail: String, unreadable: bool },
    /// Some strategy matched several nodes and nothing picked one.
    Ambiguous {
        strategy: String,
        matches: usize,
        detail: String,
    },
}

impl Resolution {
    pub fn found(&self) -> Option<&ResolvedElement> {
        match self {
            Resolution::Found(element) => Some(element),
            _ => None,
        }
    }

    pub fn into_found(self) -> Option<ResolvedElement> {
        match self {
            Resolution::Found(element) => Some(element),
            _ => None,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            Resolution::Found(_) => OutcomeStatus::Succeeded,
            Resolution::NotFound { .. } => OutcomeStatus::NotFound,
            Resolution::Ambiguous { .. } => OutcomeStatus::AmbiguousMatch,
        }
    }

    /// Outcome for callers that only resolve.
    pub fn to_outcome(&self, clock: &Stopwatch) -> ActionOutcome {
        let outcome = clock.outcome(self.status());
        match self {
            Resolution::Found(element) => outcome
                .with_strategy(element.matched_strategy.clone())
                .with_detail(format!("resolved {}", element.handle)),
            Resolution::NotFound { detail, .. } => outcome.with_detail(detail.clone()),
            Resolution::Ambiguous {
                strategy, detail, ..
            } => outcome
                .with_strategy(strategy.clone())
                .with_detail(detail.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_catches_malformed_intents() {
        let page = ScopeContext::Page;
        assert!(Intent::new("").validate(&page).is_err());
        assert!(Intent::new("button").labelled("  ").validate(&page).is_err());
        assert!(Intent::new("row")
            .with_attribute("", "x")
            .validate(&page)
            .is_err());
        assert!(Intent::new("button").labelled("Save").validate(&page).is_ok());
    }

    #[test]
    fn container_must_match_scope_kind() {
        let intent = Intent::new("button")
            .labelled("Select Headers")
            .within(ScopeKind::TableAt);
        assert!(intent.validate(&ScopeContext::TableAt(1)).is_ok());
        let err = intent.validate(&ScopeContext::Modal).unwrap_err();
        assert!(matches!(err, LocatorError::ScopeMismatch { .. }));
        assert!(intent
            .clone()
            .within(ScopeKind::ExpandedRow)
            .validate(&ScopeContext::ExpandedRow(String::new()))
            .is_err());
    }

    #[test]
    fn intent_reads_from_yaml() {
        let intent = Intent::from_yaml_str(
            "role: checkbox\ntarget:\n  label:\n    text: Credit\n    exact: false\nordinal: 1\n",
        )
        .unwrap();
        assert_eq!(intent.label(), Some("Credit"));
        assert_eq!(intent.ordinal, Some(1));
        assert_eq!(intent.to_string(), "checkbox ~\"Credit\" #1");
    }

    #[test]
    fn whitespace_normalisation() {
        assert_eq!(normalize_ws("  Select \n  Headers "), "Select Headers");
    }
}
