//! Bitwarden vault export through the `bw` command line client.
//!
//! Every operation that needs an authenticated client takes a [`Session`]
//! explicitly. Sessions are only produced by [`BitwardenAgent::login`] and
//! [`BitwardenAgent::unlock`], and each operation checks the session state
//! it requires before running anything.

pub mod agent;
pub mod error;
pub mod runner;
pub mod session;
pub mod validate;

pub use agent::{BitwardenAgent, Credentials};
pub use error::{ExportError, Result};
pub use runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner};
pub use session::{Session, SessionState};
pub use validate::{ExportSummary, validate_export};
