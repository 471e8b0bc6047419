//! Error types for the engine's primitives

use driver_adapter::DriverError;
use thiserror::Error;

use crate::types::OutcomeStatus;

/// Errors that are not ordinary outcomes.
///
/// "Not found yet", "timed out" and "all tactics failed" are never errors; they come back as
/// [`crate::ActionOutcome`] values. What lands here is misuse or a step the caller marked
/// mandatory.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Configuration values that cannot work (zero interval, share outside (0, 1], ...)
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// A mandatory step produced a non-success outcome
    #[error("Required step ended with {status}: {detail}")]
    Required { status: OutcomeStatus, detail: String },

    /// Driver failure outside the outcome model (e.g. during setup)
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl EngineError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Required { status, .. } => {
                matches!(status, OutcomeStatus::NotFound | OutcomeStatus::TimedOut)
            }
            EngineError::Driver(err) => err.retriable,
            EngineError::InvalidConfig(_) => false,
        }
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            EngineError::InvalidConfig(_) => 3,
            EngineError::Required { status, .. } => match status {
                OutcomeStatus::AmbiguousMatch => 2,
                OutcomeStatus::ActionFailed => 2,
                _ => 1,
            },
            EngineError::Driver(_) => 2,
        }
    }
}
