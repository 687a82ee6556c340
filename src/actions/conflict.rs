//! Destination conflict detection.
//!
//! Before anything is written over a destination path, [`check_conflict`]
//! decides whether doing so can lose data. The checks run cheapest first
//! and stop at the first one that settles the answer:
//!
//! 1. destination missing: [`RelocationDecision::Safe`]
//! 2. destination is a directory, symlink or special file: conflict
//! 3. sizes differ: conflict
//! 4. fingerprints differ: conflict, otherwise
//!    [`RelocationDecision::IdenticalExists`]
//!
//! Only the last step reads file content.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::scanner::{HashError, Hasher};

/// Why a destination was judged unsafe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Destination is a directory.
    IsDirectory,
    /// Destination is a symlink or other non-regular entry.
    NotRegularFile,
    /// Destination holds a file of a different size.
    SizeMismatch,
    /// Destination has the same size but different content.
    ContentMismatch,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::IsDirectory => "destination is a directory",
            Self::NotRegularFile => "destination is not a regular file",
            Self::SizeMismatch => "destination exists with a different size",
            Self::ContentMismatch => "destination exists with different content",
        };
        f.write_str(text)
    }
}

/// Outcome of checking one (source, destination) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationDecision {
    /// Nothing at the destination.
    Safe,
    /// Destination holds the same content as the source.
    IdenticalExists,
    /// Destination holds something else; do not touch it.
    Conflict(ConflictReason),
}

impl RelocationDecision {
    /// Whether the operation may go ahead.
    #[must_use]
    pub fn may_proceed(self) -> bool {
        !matches!(self, Self::Conflict(_))
    }
}

/// Decide whether `candidate` can be overwritten with `existing`.
///
/// The destination is inspected with `symlink_metadata`, so a symlink
/// there (even a dangling one) counts as occupied.
///
/// # Errors
///
/// Returns [`HashError`] if the source cannot be inspected or if either
/// file cannot be read while fingerprinting.
pub fn check_conflict(
    existing: &Path,
    candidate: &Path,
    hasher: &Hasher,
) -> Result<RelocationDecision, HashError> {
    let candidate_meta = match fs::symlink_metadata(candidate) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RelocationDecision::Safe),
        Err(e) => return Err(HashError::from_io(candidate, e)),
    };

    if candidate_meta.is_dir() {
        return Ok(RelocationDecision::Conflict(ConflictReason::IsDirectory));
    }

    if !candidate_meta.is_file() {
        return Ok(RelocationDecision::Conflict(ConflictReason::NotRegularFile));
    }

    let existing_size = fs::metadata(existing)
        .map_err(|e| HashError::from_io(existing, e))?
        .len();
    if candidate_meta.len() != existing_size {
        return Ok(RelocationDecision::Conflict(ConflictReason::SizeMismatch));
    }

    let existing_fp = hasher.fingerprint(existing, existing_size)?;
    let candidate_fp = hasher.fingerprint(candidate, existing_size)?;
    if existing_fp == candidate_fp {
        Ok(RelocationDecision::IdenticalExists)
    } else {
        Ok(RelocationDecision::Conflict(ConflictReason::ContentMismatch))
    }
}
