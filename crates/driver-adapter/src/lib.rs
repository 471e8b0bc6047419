//! Driver boundary for uiresolve.
//!
//! The engine only ever talks to a [`Driver`]: query nodes, ask about them, and deliver
//! input. Two implementations ship here: [`CdpDriver`] for a real Chrome page and
//! [`MemoryDriver`] for deterministic in-process trees.

pub mod cdp;
pub mod config;
pub mod driver;
pub mod error;
pub mod memory;
pub mod selector;

pub use cdp::CdpDriver;
pub use config::{detect_chrome_executable, DriverConfig};
pub use driver::{ClickMode, Driver, Key};
pub use error::{DriverError, DriverErrorKind};
pub use memory::{DomHandler, El, MemoryDom, MemoryDriver};
pub use selector::{ElementTree, SelectorList};
pub use uiresolve_core_types::NodeHandle;
