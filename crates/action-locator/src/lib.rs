//! Intent-driven element resolution
//!
//! Turns a semantic [`Intent`] ("the Select Headers button of the second table") into one
//! concrete node by walking a data-driven [`StrategyPlan`] under a time budget, narrowing
//! every match set to a [`ScopeContext`] first. Absent and ambiguous elements come back as
//! [`Resolution`] values; only malformed input is an error.

pub mod errors;
pub mod resolver;
pub mod scope;
pub mod strategies;
pub mod types;
pub mod yaml;

pub use errors::LocatorError;
pub use resolver::{ElementResolver, Resolver};
pub use scope::{Boundary, ScopeResolver, ScopeSelectors};
pub use strategies::{css_escape, CandidateStrategy, SelectorTemplate, StrategyPlan};
pub use types::{normalize_ws, Intent, Resolution, ResolvedElement, Target};
pub use yaml::from_yaml_str;
pub use uiresolve_core_types::{ScopeContext, ScopeKind};
