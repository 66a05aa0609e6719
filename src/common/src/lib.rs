pub mod cli;
pub mod config;
pub mod reporting;

pub use config::{ConfigError, Configuration};
pub use reporting::{ErrorReporter, LogReporter, SentryReporter};
