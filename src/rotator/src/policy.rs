//! Retention decision over a set of managed export files.
//!
//! The decision is a pure function of the files, the two thresholds and the
//! evaluation instant. It never fails and never logs; callers inspect the
//! [`RetentionVerdict`] to decide what to report.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::naming::ManagedFile;

/// Why a decision condemned what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionVerdict {
    /// No file has reached the TTL.
    NothingExpired,
    /// Fewer files than the floor exist; nothing may be pruned yet.
    InsufficientHistory { found: usize, required: usize },
    /// Every file is expired, or there are none at all. Deleting them would
    /// empty the directory, which usually means new exports stopped arriving.
    WouldRemoveAll { count: usize },
    /// Expired files are condemned. `spared` of them were kept back to
    /// honour the floor.
    Prune { expired: usize, spared: usize },
}

impl RetentionVerdict {
    /// Whether the verdict should be surfaced as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RetentionVerdict::InsufficientHistory { .. } | RetentionVerdict::WouldRemoveAll { .. }
        )
    }
}

/// Result of one policy evaluation.
///
/// Both lists are in canonical order: newest first, ties broken by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionDecision {
    pub verdict: RetentionVerdict,
    pub keep: Vec<ManagedFile>,
    pub condemned: Vec<ManagedFile>,
}

impl RetentionDecision {
    fn keep_all(verdict: RetentionVerdict, files: Vec<ManagedFile>) -> Self {
        Self {
            verdict,
            keep: files,
            condemned: Vec::new(),
        }
    }
}

/// Age-based retention with a floor on surviving copies.
///
/// A file whose age in whole hours is at least `ttl_hours` is expired. Expired
/// files are deleted unless that would leave fewer than `min_copies` files, in
/// which case the newest expired files are kept back until the floor holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub min_copies: usize,
    pub ttl_hours: u64,
}

impl RetentionPolicy {
    pub fn new(min_copies: usize, ttl_hours: u64) -> Self {
        Self {
            min_copies,
            ttl_hours,
        }
    }

    /// Decide which of `files` to delete at instant `now`.
    ///
    /// Input order does not matter.
    pub fn evaluate(&self, files: &[ManagedFile], now: DateTime<Utc>) -> RetentionDecision {
        let mut files = files.to_vec();
        files.sort_by(canonical_order);

        if files.len() < self.min_copies {
            return RetentionDecision::keep_all(
                RetentionVerdict::InsufficientHistory {
                    found: files.len(),
                    required: self.min_copies,
                },
                files,
            );
        }

        let (mut expired, fresh): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|file| self.is_expired(file, now));

        // Also true of an empty set: no fresh export exists either way.
        if fresh.is_empty() {
            return RetentionDecision::keep_all(
                RetentionVerdict::WouldRemoveAll {
                    count: expired.len(),
                },
                expired,
            );
        }

        if expired.is_empty() {
            return RetentionDecision::keep_all(RetentionVerdict::NothingExpired, fresh);
        }

        let total_expired = expired.len();
        let spared = self.min_copies.saturating_sub(fresh.len());
        let condemned = expired.split_off(spared);

        let mut keep = fresh;
        keep.extend(expired);
        keep.sort_by(canonical_order);

        RetentionDecision {
            verdict: RetentionVerdict::Prune {
                expired: total_expired,
                spared,
            },
            keep,
            condemned,
        }
    }

    fn is_expired(&self, file: &ManagedFile, now: DateTime<Utc>) -> bool {
        // Future-dated files have a negative age and never expire.
        u64::try_from(file.age_hours(now)).is_ok_and(|age| age >= self.ttl_hours)
    }
}

/// Newest first; equal timestamps ordered by path, descending.
pub(crate) fn canonical_order(a: &ManagedFile, b: &ManagedFile) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.path.cmp(&a.path))
}
