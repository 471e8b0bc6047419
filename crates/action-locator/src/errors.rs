//! Error types for the locator

use driver_adapter::{DriverError, DriverErrorKind};
use thiserror::Error;

/// Usage errors raised by resolution.
///
/// An element that is absent or ambiguous is not an error; it is a
/// [`crate::Resolution`]. These variants mean the caller built something that can never
/// resolve.
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Malformed intent (empty role, empty label, empty attribute name)
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    /// The intent requires one kind of container and the caller passed another
    #[error("Intent requires a {required} scope but {supplied} was supplied")]
    ScopeMismatch { required: String, supplied: String },

    /// Malformed scope (e.g. expanded row without a row id)
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Plan with no strategies, duplicate ids or unknown template placeholders
    #[error("Invalid strategy plan: {0}")]
    InvalidPlan(String),

    /// A rendered selector the driver refused to parse
    #[error("Strategy '{strategy}' produced an invalid selector: {reason}")]
    InvalidSelector { strategy: String, reason: String },

    /// Plan file could not be read or parsed
    #[error("Plan load error: {0}")]
    PlanLoad(String),

    /// Intent document could not be parsed
    #[error("Intent load error: {0}")]
    IntentLoad(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::InvalidSelector { .. } | LocatorError::InvalidPlan(_) => 3,
            LocatorError::InvalidIntent(_)
            | LocatorError::ScopeMismatch { .. }
            | LocatorError::InvalidScope(_) => 2,
            LocatorError::PlanLoad(_) | LocatorError::IntentLoad(_) => 1,
        }
    }

    pub(crate) fn from_driver(strategy: &str, err: &DriverError) -> Option<Self> {
        (err.kind == DriverErrorKind::InvalidSelector).then(|| LocatorError::InvalidSelector {
            strategy: strategy.to_string(),
            reason: err.hint.clone().unwrap_or_else(|| err.to_string()),
        })
    }
}

impl From<uiresolve_core_types::ValueError> for LocatorError {
    fn from(err: uiresolve_core_types::ValueError) -> Self {
        LocatorError::InvalidScope(err.to_string())
    }
}
