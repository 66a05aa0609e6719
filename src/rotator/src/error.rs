use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A single file that could not be removed during a rotation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for DeletionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Errors that abort a whole rotator operation.
///
/// Per-file problems (unparsable names, single failed deletions) are not
/// errors; they are collected in the scan and the rotation outcome.
#[derive(Error, Debug)]
pub enum RotatorError {
    /// Prefix or extension cannot be used to build filenames.
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidNaming {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The rotation directory could not be listed.
    #[error("Failed to read rotation directory {}: {source}", .path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    /// A freshly generated export path already exists.
    #[error("Export path {} already exists", .0.display())]
    PathCollision(PathBuf),

    /// Deletions were expected but every one of them failed.
    #[error(
        "Failed to delete any of {attempted} expired files (first failure: {})",
        first_failure(.failures)
    )]
    DeletionFailed {
        attempted: usize,
        failures: Vec<DeletionFailure>,
    },
}

fn first_failure(failures: &[DeletionFailure]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none recorded".to_string())
}

pub type Result<T> = std::result::Result<T, RotatorError>;
