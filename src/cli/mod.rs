pub mod app;
pub mod browser;
pub mod columns;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod probe;
pub mod runtime;

pub use app::run;
pub use env::CliArgs;
pub use output::{HumanReadable, OutputFormat};
