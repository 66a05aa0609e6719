//! Canonical export filenames: `<prefix>-<YYYYMMDD>_<HHMMSS><±HHMM>.<extension>`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, RotatorError};

/// chrono format of the timestamp segment. `%z` renders `+0000` for UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S%z";

const SECONDS_PER_HOUR: i64 = 60 * 60;

/// An export file recognised by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub path: PathBuf,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

impl ManagedFile {
    /// Age in whole hours, floored. Negative for files dated in the future.
    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp)
            .num_seconds()
            .div_euclid(SECONDS_PER_HOUR)
    }
}

/// Outcome of matching a filename against a [`FileNaming`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    /// Prefix or extension don't match; not ours.
    Unrelated,
    /// Looks like ours but the timestamp segment doesn't parse.
    Malformed,
    /// A well-formed export name.
    Managed(DateTime<Utc>),
}

/// Prefix and extension of one family of export files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNaming {
    prefix: String,
    extension: String,
}

impl FileNaming {
    /// A leading `.` on the extension is dropped.
    pub fn new(prefix: impl Into<String>, extension: impl AsRef<str>) -> Result<Self> {
        let prefix = prefix.into();
        let extension = extension.as_ref().trim_start_matches('.').to_string();

        validate_part("prefix", &prefix)?;
        validate_part("extension", &extension)?;

        Ok(Self { prefix, extension })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Filename for an export taken at `at`.
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}.{}",
            self.prefix,
            at.format(TIMESTAMP_FORMAT),
            self.extension
        )
    }

    /// Classify a filename.
    pub fn parse(&self, file_name: &str) -> NameMatch {
        let suffix = format!(".{}", self.extension);
        if !file_name.starts_with(&self.prefix) || !file_name.ends_with(&suffix) {
            return NameMatch::Unrelated;
        }

        let raw = file_name
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(suffix.as_str()));

        match raw.and_then(parse_timestamp) {
            Some(timestamp) => NameMatch::Managed(timestamp),
            None => NameMatch::Malformed,
        }
    }

    /// Build a [`ManagedFile`] for `path` if its name is a well-formed export name.
    pub fn managed_file(&self, path: &Path) -> Option<ManagedFile> {
        let name = path.file_name()?.to_str()?;
        match self.parse(name) {
            NameMatch::Managed(timestamp) => Some(ManagedFile {
                path: path.to_path_buf(),
                name: name.to_string(),
                timestamp,
            }),
            NameMatch::Unrelated | NameMatch::Malformed => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn validate_part(field: &'static str, value: &str) -> Result<()> {
    let reason = if value.trim().is_empty() {
        "must not be empty"
    } else if value.contains(['/', '\\']) {
        "must not contain path separators"
    } else {
        return Ok(());
    };

    Err(RotatorError::InvalidNaming {
        field,
        value: value.to_string(),
        reason,
    })
}
