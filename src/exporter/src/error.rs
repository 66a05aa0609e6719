use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum ExportError {
    /// The command needs a session in a state the caller doesn't hold.
    #[error("Must hold an {required} session before running the {command} command (have {actual})")]
    SessionRequired {
        command: &'static str,
        required: SessionState,
        actual: SessionState,
    },

    #[error("Failed to launch `{command}`: {source}")]
    Spawn { command: String, source: io::Error },

    #[error("Command `{command}` failed with status {}: {stderr}", .code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("The {command} command returned an empty session key")]
    EmptySessionKey { command: &'static str },

    #[error("I/O error on export {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Export {} is not valid JSON: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Validation failed: export {} is encrypted", .path.display())]
    Encrypted { path: PathBuf },

    #[error("Validation failed: export {} contains no items", .path.display())]
    NoItems { path: PathBuf },
}

impl ExportError {
    /// Whether `bw` refused because a login is already active.
    pub fn is_already_logged_in(&self) -> bool {
        matches!(
            self,
            ExportError::CommandFailed { stderr, .. }
                if stderr.to_lowercase().contains("already logged in")
        )
    }

    /// Whether `bw` wrote a file that failed the post-export checks.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            ExportError::InvalidJson { .. } | ExportError::Encrypted { .. } | ExportError::NoItems { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
