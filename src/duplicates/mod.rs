//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Cataloguing every non-empty file under a root (scan pass)
//! - Size pre-filtering so unique sizes are never read
//! - Sampled fingerprinting of size collisions on a bounded thread pool
//! - Partitioning into equivalence classes with a canonical member

pub mod finder;
pub mod groups;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::{partition_records, EquivalenceClass, GroupingStats};
