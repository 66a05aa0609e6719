//! Retention of timestamped export files in a single directory.
//!
//! Export files are named `<prefix>-<YYYYMMDD>_<HHMMSS><±HHMM>.<extension>`
//! and the directory listing is the only record of what exists. A rotation
//! pass lists the directory, asks the [`RetentionPolicy`] which files may go,
//! and deletes them oldest-first.
//!
//! ## Architecture
//!
//! - `naming`: canonical filename format and parsing
//! - `policy`: pure retention decision with a floor on surviving copies
//! - `scanner`: directory listing, path generation and deletion
//! - `clock`: source of "now" for ages and new filenames
//!
//! ## Usage
//!
//! ```no_run
//! use rotator::{FileNaming, FileRotator, RetentionPolicy};
//!
//! let naming = FileNaming::new("bitwarden_export", "json")?;
//! let rotator = FileRotator::new("/var/backups/bw", naming, RetentionPolicy::new(3, 24));
//!
//! let target = rotator.new_file_path()?;
//! // ... write the export to `target` ...
//! let outcome = rotator.rotate()?;
//! println!("deleted {} of {} exports", outcome.deleted, outcome.scanned);
//! # Ok::<(), rotator::RotatorError>(())
//! ```

pub mod clock;
pub mod error;
pub mod naming;
pub mod policy;
pub mod scanner;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DeletionFailure, RotatorError};
pub use naming::{FileNaming, ManagedFile, NameMatch, TIMESTAMP_FORMAT};
pub use policy::{RetentionDecision, RetentionPolicy, RetentionVerdict};
pub use scanner::{DirectoryScan, FileRotator, RotationOutcome};
