use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Malformed value error shared by the engine crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("{message}")]
    Invalid { message: String },
}

impl ValueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Identifies one browser session. Each session owns exactly one driver.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Correlates the log lines and outcome of one logical action.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a DOM node, issued by a driver.
///
/// A handle is only meaningful to the driver that produced it and only until the next
/// re-render replaces the node. Never keep one across two logical actions.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub String);

impl NodeHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of container a match must fall into, without its parameters.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScopeKind {
    Page,
    Modal,
    TableAt,
    ExpandedRow,
    Row,
}

impl ScopeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScopeKind::Page => "page",
            ScopeKind::Modal => "modal",
            ScopeKind::TableAt => "table_at",
            ScopeKind::ExpandedRow => "expanded_row",
            ScopeKind::Row => "row",
        }
    }
}

/// The container within which a match must fall.
///
/// Supplied by the caller on every call; the engine never tracks "what is currently open".
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScopeContext {
    /// Whole document, no filtering.
    Page,
    /// The top-most visible modal dialog.
    Modal,
    /// The i-th table on the page, 0-based, re-evaluated on every call.
    TableAt(usize),
    /// The detail subtree rendered immediately after the row with this id.
    ExpandedRow(String),
    /// The data row with this id, excluding its detail row.
    Row(String),
}

impl ScopeContext {
    pub fn kind(&self) -> ScopeKind {
        match self {
            ScopeContext::Page => ScopeKind::Page,
            ScopeContext::Modal => ScopeKind::Modal,
            ScopeContext::TableAt(_) => ScopeKind::TableAt,
            ScopeContext::ExpandedRow(_) => ScopeKind::ExpandedRow,
            ScopeContext::Row(_) => ScopeKind::Row,
        }
    }

    /// Rejects scopes that cannot be evaluated at all.
    pub fn validate(&self) -> Result<(), ValueError> {
        match self {
            ScopeContext::ExpandedRow(anchor) if anchor.trim().is_empty() => Err(ValueError::new(
                "expanded-row scope requires a non-empty anchor row id",
            )),
            ScopeContext::Row(id) if id.trim().is_empty() => {
                Err(ValueError::new("row scope requires a non-empty row id"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for ScopeContext {
    fn default() -> Self {
        ScopeContext::Page
    }
}

impl fmt::Display for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeContext::Page => write!(f, "page"),
            ScopeContext::Modal => write!(f, "modal"),
            ScopeContext::TableAt(index) => write!(f, "table[{}]", index),
            ScopeContext::ExpandedRow(anchor) => write!(f, "expanded-row[{}]", anchor),
            ScopeContext::Row(id) => write!(f, "row[{}]", id),
        }
    }
}

/// Parses the [`fmt::Display`] form back: `page`, `modal`, `table[2]`, `expanded-row[id]`,
/// `row[id]`.
impl FromStr for ScopeContext {
    type Err = ValueError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        match raw {
            "page" => return Ok(ScopeContext::Page),
            "modal" => return Ok(ScopeContext::Modal),
            _ => {}
        }
        let bracketed = |prefix: &str| {
            raw.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('['))
                .and_then(|rest| rest.strip_suffix(']'))
        };
        if let Some(index) = bracketed("table") {
            let index = index
                .trim()
                .parse::<usize>()
                .map_err(|_| ValueError::new(format!("bad table ordinal in '{}'", raw)))?;
            return Ok(ScopeContext::TableAt(index));
        }
        if let Some(anchor) = bracketed("expanded-row") {
            let scope = ScopeContext::ExpandedRow(anchor.trim().to_string());
            scope.validate()?;
            return Ok(scope);
        }
        if let Some(id) = bracketed("row") {
            let scope = ScopeContext::Row(id.trim().to_string());
            scope.validate()?;
            return Ok(scope);
        }
        Err(ValueError::new(format!(
            "unknown scope '{}'; expected page, modal, table[N], expanded-row[ID] or row[ID]",
            raw
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_kind_matches_context() {
        assert_eq!(ScopeContext::Page.kind(), ScopeKind::Page);
        assert_eq!(ScopeContext::TableAt(3).kind(), ScopeKind::TableAt);
        assert_eq!(
            ScopeContext::ExpandedRow("r1".into()).kind(),
            ScopeKind::ExpandedRow
        );
    }

    #[test]
    fn empty_expanded_row_is_rejected() {
        assert!(ScopeContext::ExpandedRow("  ".into()).validate().is_err());
        assert!(ScopeContext::ExpandedRow("row-7".into()).validate().is_ok());
        assert!(ScopeContext::Row("".into()).validate().is_err());
        assert!(ScopeContext::TableAt(0).validate().is_ok());
    }

    #[test]
    fn display_is_stable_for_logs() {
        assert_eq!(ScopeContext::TableAt(1).to_string(), "table[1]");
        assert_eq!(
            ScopeContext::ExpandedRow("abc".into()).to_string(),
            "expanded-row[abc]"
        );
    }

    #[test]
    fn parses_its_own_display_form() {
        for scope in [
            ScopeContext::Page,
            ScopeContext::Modal,
            ScopeContext::TableAt(4),
            ScopeContext::ExpandedRow("acct-9".into()),
            ScopeContext::Row("acct-9".into()),
        ] {
            assert_eq!(scope.to_string().parse::<ScopeContext>(), Ok(scope));
        }
        assert!("table[x]".parse::<ScopeContext>().is_err());
        assert!("expanded-row[ ]".parse::<ScopeContext>().is_err());
        assert!("dialog".parse::<ScopeContext>().is_err());
    }
}
