//! uiresolve CLI library
//!
//! Configuration loading and the command implementations behind the `uiresolve` binary.

pub mod cli;
pub mod config;

pub use config::AppConfig;
