use action_gate::GateError;
use driver_adapter::DriverError;
use thiserror::Error;

/// Failures reading or driving table widgets.
///
/// Unknown columns, absent tables and out-of-range cells are not errors; they come back as
/// `None` or as a `NotFound` outcome.
#[derive(Debug, Error)]
pub enum PerceiverError {
    #[error("driver error while reading the table: {0}")]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Gate(#[from] GateError),
}

impl PerceiverError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PerceiverError::Driver(err) => err.retriable || err.is_stale(),
            PerceiverError::Gate(err) => err.is_retryable(),
        }
    }
}
