//! Error types for the gate

use action_locator::LocatorError;
use action_primitives::EngineError;
use thiserror::Error;

/// Gate error enumeration
///
/// A post-condition that never holds is a `TimedOut` outcome, not an error. These variants
/// cover conditions and requests that can never be evaluated.
#[derive(Debug, Error, Clone)]
pub enum GateError {
    /// Condition that cannot be evaluated (bad selector, bad pattern, empty combinator)
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    /// Malformed intent, scope or plan
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// Engine misconfiguration or a mandatory step that did not succeed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl GateError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GateError::InvalidCondition(_) => false,
            GateError::Locator(err) => err.is_retryable(),
            GateError::Engine(err) => err.is_retryable(),
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            GateError::InvalidCondition(_) => 2,
            GateError::Locator(err) => err.severity(),
            GateError::Engine(err) => err.severity(),
        }
    }
}
