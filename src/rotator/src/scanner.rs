//! Directory scanning and deletion for a rotation pass.
//!
//! The directory listing is authoritative: nothing is cached between passes.
//! Per-file problems never abort a pass. Names that look like exports but
//! carry a bad timestamp are reported as anomalies and left alone, and a
//! failed deletion is recorded before moving on to the next file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::clock::{Clock, SystemClock};
use crate::error::{DeletionFailure, Result, RotatorError};
use crate::naming::{FileNaming, ManagedFile, NameMatch};
use crate::policy::{RetentionDecision, RetentionPolicy, RetentionVerdict, canonical_order};

/// Contents of the rotation directory as seen by one pass.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScan {
    /// Well-formed export files, newest first.
    pub managed: Vec<ManagedFile>,
    /// Files matching prefix and extension whose timestamp does not parse.
    pub anomalies: Vec<PathBuf>,
}

/// Summary of a rotation pass.
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    /// Managed files found.
    pub scanned: usize,
    /// Anomalous files found (never deleted).
    pub anomalous: usize,
    /// Files removed (or that would be removed, in dry-run mode).
    pub deleted: usize,
    /// Managed files left after the pass. A dry run removes nothing, so
    /// this equals `scanned` there.
    pub remaining: usize,
    pub verdict: RetentionVerdict,
    pub failures: Vec<DeletionFailure>,
}

/// Removes one condemned file.
pub type RemoveFn = fn(&Path) -> io::Result<()>;

/// Rotates export files in a single flat directory.
#[derive(Debug, Clone)]
pub struct FileRotator<C: Clock = SystemClock> {
    dir: PathBuf,
    naming: FileNaming,
    policy: RetentionPolicy,
    dry_run: bool,
    clock: C,
    remove: RemoveFn,
}

impl FileRotator<SystemClock> {
    pub fn new(dir: impl Into<PathBuf>, naming: FileNaming, policy: RetentionPolicy) -> Self {
        Self::with_clock(dir, naming, policy, SystemClock)
    }
}

impl<C: Clock> FileRotator<C> {
    pub fn with_clock(
        dir: impl Into<PathBuf>,
        naming: FileNaming,
        policy: RetentionPolicy,
        clock: C,
    ) -> Self {
        Self {
            dir: dir.into(),
            naming,
            policy,
            dry_run: false,
            clock,
            remove: remove_file,
        }
    }

    /// Log deletions instead of performing them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Replace how condemned files are removed. Defaults to [`fs::remove_file`].
    pub fn with_remover(mut self, remove: RemoveFn) -> Self {
        self.remove = remove;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> &FileNaming {
        &self.naming
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// List the export files in the directory.
    ///
    /// # Errors
    ///
    /// Returns [`RotatorError::ReadDir`] when the directory cannot be read.
    /// Entries that vanish or cannot be inspected mid-listing are skipped.
    pub fn list_managed_files(&self) -> Result<DirectoryScan> {
        let read_dir_error = |source| RotatorError::ReadDir {
            path: self.dir.clone(),
            source,
        };

        let mut scan = DirectoryScan::default();
        for entry in fs::read_dir(&self.dir).map_err(read_dir_error)? {
            let entry = entry.map_err(read_dir_error)?;
            let path = entry.path();

            match entry.file_type() {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            }

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::debug!(path = %path.display(), "Skipping non UTF-8 file name");
                continue;
            };

            match self.naming.parse(&name) {
                NameMatch::Managed(timestamp) => scan.managed.push(ManagedFile {
                    path,
                    name,
                    timestamp,
                }),
                NameMatch::Malformed => {
                    tracing::warn!(
                        path = %path.display(),
                        prefix = self.naming.prefix(),
                        "Found unexpected file in the rotation directory; leaving it alone"
                    );
                    scan.anomalies.push(path);
                }
                NameMatch::Unrelated => {
                    tracing::debug!(path = %path.display(), "Ignoring unrelated file");
                }
            }
        }

        scan.managed.sort_by(canonical_order);
        scan.anomalies.sort();
        Ok(scan)
    }

    /// Path for a new export taken now.
    ///
    /// # Errors
    ///
    /// Returns [`RotatorError::PathCollision`] if the path already exists.
    pub fn new_file_path(&self) -> Result<PathBuf> {
        let path = self.dir.join(self.naming.file_name(self.clock.now()));
        if path.exists() {
            return Err(RotatorError::PathCollision(path));
        }

        tracing::info!(path = %path.display(), "New rotator file path");
        Ok(path)
    }

    /// Evaluate the policy against the current directory contents.
    pub fn plan(&self) -> Result<(DirectoryScan, RetentionDecision)> {
        let scan = self.list_managed_files()?;
        let decision = self.policy.evaluate(&scan.managed, self.clock.now());
        Ok((scan, decision))
    }

    /// Run one rotation pass.
    ///
    /// Condemned files are deleted oldest-first. A failed deletion is logged
    /// and recorded in the outcome; the pass continues with the next file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read, or if deletions were
    /// due and every one of them failed.
    pub fn rotate(&self) -> Result<RotationOutcome> {
        let (scan, decision) = self.plan()?;
        let prefix = self.naming.prefix();

        match decision.verdict {
            RetentionVerdict::InsufficientHistory { found, required } => {
                tracing::warn!(
                    prefix,
                    found,
                    required,
                    "Unable to rotate files: only {found} exist but at least {required} must exist before they can be rotated"
                );
            }
            RetentionVerdict::WouldRemoveAll { count: 0 } => {
                tracing::warn!(
                    prefix,
                    dir = %self.dir.display(),
                    "Unable to rotate files: no exports found. New exports may not be getting created"
                );
            }
            RetentionVerdict::WouldRemoveAll { count } => {
                tracing::warn!(
                    prefix,
                    count,
                    "Unable to rotate files: all {count} files are expired. New exports may not be getting created"
                );
            }
            RetentionVerdict::Prune { expired, spared } if spared > 0 => {
                tracing::info!(
                    prefix,
                    expired,
                    spared,
                    min_copies = self.policy.min_copies,
                    "Keeping newest expired files to honour the minimum copy count"
                );
            }
            RetentionVerdict::Prune { .. } | RetentionVerdict::NothingExpired => {}
        }

        let total = decision.condemned.len();
        let mut deleted = 0;
        let mut failures = Vec::new();

        for (idx, file) in decision.condemned.iter().rev().enumerate() {
            let position = idx + 1;
            if self.dry_run {
                tracing::info!(
                    path = %file.path.display(),
                    ttl_hours = self.policy.ttl_hours,
                    "[DRY-RUN] [{position}/{total}] Would delete old file past the TTL"
                );
                deleted += 1;
                continue;
            }

            tracing::info!(
                path = %file.path.display(),
                ttl_hours = self.policy.ttl_hours,
                "[{position}/{total}] Deleting old file past the TTL"
            );
            match (self.remove)(&file.path) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::error!(
                        path = %file.path.display(),
                        error = %e,
                        "Failed to delete old file"
                    );
                    failures.push(DeletionFailure {
                        path: file.path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if total > 0 && deleted == 0 {
            return Err(RotatorError::DeletionFailed {
                attempted: total,
                failures,
            });
        }

        if !failures.is_empty() {
            tracing::warn!(
                failed = failures.len(),
                deleted,
                "Rotation finished with deletion failures"
            );
        }

        let outcome = RotationOutcome {
            scanned: scan.managed.len(),
            anomalous: scan.anomalies.len(),
            deleted,
            remaining: if self.dry_run {
                scan.managed.len()
            } else {
                scan.managed.len() - deleted
            },
            verdict: decision.verdict,
            failures,
        };

        tracing::info!(
            scanned = outcome.scanned,
            anomalous = outcome.anomalous,
            deleted = outcome.deleted,
            remaining = outcome.remaining,
            dry_run = self.dry_run,
            "Rotation complete"
        );

        Ok(outcome)
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}
