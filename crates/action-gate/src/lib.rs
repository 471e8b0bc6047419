//! Post-conditions gate
//!
//! The layer callers use: [`WaitCondition`]s evaluated against the live page, verified
//! actions that only report success once the page shows the effect, and the [`Engine`]
//! facade tying resolution, escalation and verification to one driver.

pub mod conditions;
pub mod engine;
pub mod errors;
pub mod evaluator;
pub mod types;
pub mod validator;

pub use conditions::*;
pub use engine::Engine;
pub use errors::*;
pub use evaluator::*;
pub use types::*;
pub use validator::*;
