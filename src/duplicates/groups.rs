//! Equivalence classes of byte-identical files.
//!
//! # Overview
//!
//! An [`EquivalenceClass`] is the set of catalogued files sharing one
//! `(size, fingerprint)` pair. One member is the canonical representative;
//! every other member is a duplicate of it.
//!
//! Canonical selection is deterministic: records are ordered by
//! fingerprint, then by catalog id (scan order, which the walker keeps
//! name-sorted), and the first one wins.
//!
//! # Example
//!
//! ```
//! use dupsort::catalog::CatalogRecord;
//! use dupsort::duplicates::partition_records;
//! use std::path::PathBuf;
//!
//! let record = |id, name: &str| CatalogRecord {
//!     id,
//!     dir: PathBuf::from("/photos"),
//!     name: name.into(),
//!     size: 100,
//!     fingerprint: Some([7u8; 32]),
//!     is_duplicate: false,
//! };
//!
//! let classes = partition_records(vec![record(2, "b.jpg"), record(1, "a.jpg")]);
//! assert_eq!(classes.len(), 1);
//! assert_eq!(classes[0].canonical.name, "a.jpg");
//! assert_eq!(classes[0].duplicates[0].name, "b.jpg");
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogRecord;
use crate::scanner::{hash_to_hex, Hash};

/// Files sharing identical size and fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceClass {
    /// Shared fingerprint
    pub fingerprint: Hash,
    /// Shared size in bytes
    pub size: u64,
    /// The copy that is kept
    pub canonical: CatalogRecord,
    /// Every other copy, in catalog order
    pub duplicates: Vec<CatalogRecord>,
}

impl EquivalenceClass {
    /// Number of files in this class.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.duplicates.len()
    }

    /// Always false; a class has at least its canonical member.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of duplicate copies.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Bytes that would be reclaimed by removing every duplicate.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicates.len() as u64
    }

    /// Fingerprint as hexadecimal string.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        hash_to_hex(&self.fingerprint)
    }

    /// Path of the canonical copy.
    #[must_use]
    pub fn canonical_path(&self) -> PathBuf {
        self.canonical.path()
    }

    /// Paths of the duplicate copies.
    #[must_use]
    pub fn duplicate_paths(&self) -> Vec<PathBuf> {
        self.duplicates.iter().map(CatalogRecord::path).collect()
    }
}

/// Statistics from the grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Files in the catalog
    pub total_files: usize,
    /// Distinct sizes shared by two or more files
    pub shared_sizes: usize,
    /// Files that needed a fingerprint
    pub fingerprinted_files: usize,
    /// Files whose fingerprint could not be computed
    pub failed_files: usize,
    /// Equivalence classes found
    pub duplicate_groups: usize,
    /// Non-canonical members across all classes
    pub duplicate_files: usize,
    /// Bytes reclaimable by removing every duplicate
    pub reclaimable_space: u64,
    /// Per-file failures, one line each
    pub errors: Vec<String>,
}

impl GroupingStats {
    /// Percentage of catalogued files that never had to be read.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            let skipped = self.total_files - self.fingerprinted_files.min(self.total_files);
            (skipped as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Partition fingerprinted records into equivalence classes.
///
/// Records without a fingerprint are ignored. Partitions with a single
/// member are dropped. Classes come back ordered by fingerprint, then size.
#[must_use]
pub fn partition_records(records: impl IntoIterator<Item = CatalogRecord>) -> Vec<EquivalenceClass> {
    let mut partitions: BTreeMap<(Hash, u64), Vec<CatalogRecord>> = BTreeMap::new();

    for record in records {
        let Some(fingerprint) = record.fingerprint else {
            log::trace!("Skipping unfingerprinted record {}", record.path().display());
            continue;
        };
        partitions
            .entry((fingerprint, record.size))
            .or_default()
            .push(record);
    }

    partitions
        .into_iter()
        .filter_map(|((fingerprint, size), mut members)| {
            if members.len() < 2 {
                return None;
            }
            members.sort_by_key(|r| r.id);
            let mut members = members.into_iter();
            let canonical = members.next()?;
            Some(EquivalenceClass {
                fingerprint,
                size,
                canonical,
                duplicates: members.collect(),
            })
        })
        .collect()
}
