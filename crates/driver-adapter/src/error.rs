//! Error types surfaced by drivers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by a driver.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverErrorKind {
    /// Another element received the pointer event (overlay, backdrop, animation).
    #[error("click intercepted")]
    Intercepted,
    /// Element exists but cannot take input (hidden, zero-size, disabled).
    #[error("element not interactable")]
    NotInteractable,
    /// The handle no longer refers to a node in the document.
    #[error("stale node handle")]
    StaleHandle,
    #[error("invalid selector")]
    InvalidSelector,
    #[error("driver call timed out")]
    Timeout,
    #[error("operation unsupported by driver")]
    Unsupported,
    #[error("driver i/o failure")]
    Io,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn new(kind: DriverErrorKind) -> Self {
        let retriable = matches!(
            kind,
            DriverErrorKind::Intercepted
                | DriverErrorKind::NotInteractable
                | DriverErrorKind::Timeout
                | DriverErrorKind::Io
        );
        Self {
            kind,
            hint: None,
            retriable,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn intercepted(hint: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Intercepted).with_hint(hint)
    }

    pub fn stale(handle: impl fmt::Display) -> Self {
        Self::new(DriverErrorKind::StaleHandle).with_hint(format!("handle {}", handle))
    }

    pub fn invalid_selector(selector: &str, reason: impl fmt::Display) -> Self {
        Self::new(DriverErrorKind::InvalidSelector)
            .with_hint(format!("'{}': {}", selector, reason))
    }

    pub fn io(err: impl fmt::Display) -> Self {
        Self::new(DriverErrorKind::Io).with_hint(err.to_string())
    }

    pub fn is_stale(&self) -> bool {
        self.kind == DriverErrorKind::StaleHandle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint() {
        let err = DriverError::intercepted("div.cdk-overlay-backdrop");
        assert_eq!(
            err.to_string(),
            "click intercepted: div.cdk-overlay-backdrop"
        );
        assert!(err.retriable);
    }

    #[test]
    fn stale_is_not_retriable() {
        let err = DriverError::stale("n42");
        assert!(err.is_stale());
        assert!(!err.retriable);
    }
}
