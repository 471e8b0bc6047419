//! Action primitives for uiresolve
//!
//! The timing and interaction building blocks everything else composes:
//! - the wait/poll engine ([`Poller`], [`PollSession`], [`poll_until`])
//! - the interaction escalator ([`Escalator`] over a [`TacticLadder`])
//! - the closed [`ActionOutcome`] returned by every engine operation
//! - engine-wide timing configuration

pub mod config;
pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use config::*;
pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
