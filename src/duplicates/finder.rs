//! Duplicate finder implementation.
//!
//! # Overview
//!
//! This module orchestrates the duplicate detection pipeline:
//! 1. **Scan**: walk the tree and record every non-empty regular file in the
//!    [`Catalog`]
//! 2. **Size filter**: only sizes shared by two or more files go further;
//!    a file with a unique size is never read
//! 3. **Fingerprint**: sampled BLAKE3 of every remaining file, on a bounded
//!    rayon pool
//! 4. **Partition**: group by `(size, fingerprint)`, pick the canonical
//!    member, flag the rest as duplicates
//!
//! # Example
//!
//! ```no_run
//! use dupsort::catalog::Catalog;
//! use dupsort::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let catalog = Catalog::open_in_memory().unwrap();
//! let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
//! let (classes, summary) = finder.find_duplicates(Path::new("."), &catalog).unwrap();
//!
//! println!("{} groups, {} duplicates", classes.len(), summary.grouping.duplicate_files);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::groups::{partition_records, EquivalenceClass, GroupingStats};
use crate::catalog::{Catalog, CatalogError, CatalogRecord};
use crate::progress::ProgressCallback;
use crate::scanner::{FileEntry, Hash, HashError, Hasher, ScanError, Walker, WalkerConfig};
use crate::scanner::DEDUPE_SAMPLE_SIZE;

/// Rows buffered before each catalog transaction during the scan.
const INSERT_BATCH: usize = 1024;

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of I/O threads for parallel fingerprinting.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Fingerprint sample size in bytes.
    pub sample_size: u64,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("sample_size", &self.sample_size)
            .field("walker_config", &self.walker_config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            sample_size: DEDUPE_SAMPLE_SIZE,
            walker_config: WalkerConfig::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the I/O thread count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the fingerprint sample size.
    #[must_use]
    pub fn with_sample_size(mut self, bytes: u64) -> Self {
        self.sample_size = bytes;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Summary of a scan (and, for [`DuplicateFinder::find_duplicates`], of grouping).
///
/// Only completed runs produce one; an interrupt surfaces as
/// [`FinderError::Interrupted`].
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Files recorded in the catalog
    pub total_files: usize,
    /// Combined size of catalogued files in bytes
    pub total_size: u64,
    /// Errors encountered while walking
    pub scan_errors: Vec<ScanError>,
    /// Grouping results (default when only the scan ran)
    pub grouping: GroupingStats,
    /// Wall-clock duration
    pub duration: Duration,
}

impl ScanSummary {
    /// Percentage of scanned bytes taken up by duplicates.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.grouping.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Reclaimable space as a human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        bytesize::ByteSize::b(self.grouping.reclaimable_space).to_string()
    }

    /// Total size as a human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        bytesize::ByteSize::b(self.total_size).to_string()
    }
}

/// Errors that abort a duplicate search.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Runs scan and grouping passes against a [`Catalog`].
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Arc<Hasher>,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new(config.sample_size);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(flag.clone());
        }
        Self {
            config,
            hasher: Arc::new(hasher),
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Scan then group.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if the root is invalid, the catalog fails,
    /// or shutdown is requested.
    pub fn find_duplicates(
        &self,
        root: &Path,
        catalog: &Catalog,
    ) -> Result<(Vec<EquivalenceClass>, ScanSummary), FinderError> {
        let start = Instant::now();
        let mut summary = self.scan(root, catalog)?;
        let (classes, grouping) = self.group(catalog)?;
        summary.grouping = grouping;
        summary.duration = start.elapsed();
        Ok((classes, summary))
    }

    /// Walk `root` and record every non-empty regular file in `catalog`.
    ///
    /// Zero-byte files and symbolic links are never catalogued. Per-file
    /// walk errors are collected in the summary and do not stop the scan.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if the root is invalid, the catalog fails,
    /// or shutdown is requested.
    pub fn scan(&self, root: &Path, catalog: &Catalog) -> Result<ScanSummary, FinderError> {
        let start = Instant::now();
        let mut summary = ScanSummary::default();

        if !root.exists() {
            return Err(FinderError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(FinderError::NotADirectory(root.to_path_buf()));
        }

        log::info!("Scanning {}", root.display());
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("scan", 0);
            callback.on_message(&format!("Walking {}", root.display()));
        }

        let mut walker = Walker::new(root, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }
        if let Some(ref callback) = self.config.progress_callback {
            walker = walker.with_progress_callback(callback.clone());
        }

        let mut batch: Vec<FileEntry> = Vec::with_capacity(INSERT_BATCH);
        for result in walker.walk() {
            match result {
                Ok(file) if file.size == 0 => {
                    log::debug!("Skip empty: {}", file.path.display());
                }
                Ok(file) if file.is_symlink => {
                    log::debug!("Skip soft link: {}", file.path.display());
                }
                Ok(file) => {
                    summary.total_files += 1;
                    summary.total_size += file.size;
                    batch.push(file);
                    if batch.len() >= INSERT_BATCH {
                        catalog.insert_entries(&batch)?;
                        batch.clear();
                    }
                }
                Err(e) => {
                    log::warn!("Scan error: {}", e);
                    summary.scan_errors.push(e);
                }
            }
        }
        if !batch.is_empty() {
            catalog.insert_entries(&batch)?;
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("scan");
        }

        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        summary.duration = start.elapsed();
        log::info!(
            "Scan complete: {} files ({}) catalogued, {} errors",
            summary.total_files,
            summary.total_size_display(),
            summary.scan_errors.len()
        );
        Ok(summary)
    }

    /// Fingerprint size collisions and partition them into equivalence classes.
    ///
    /// Duplicates are flagged in the catalog. A file that cannot be read is
    /// left without a fingerprint and takes no part in any class.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if the catalog fails or shutdown is requested.
    pub fn group(
        &self,
        catalog: &Catalog,
    ) -> Result<(Vec<EquivalenceClass>, GroupingStats), FinderError> {
        let mut stats = GroupingStats {
            total_files: catalog.len()?,
            ..Default::default()
        };

        let sizes = catalog.sizes_with_multiple_entries()?;
        stats.shared_sizes = sizes.len();

        let mut candidates: Vec<CatalogRecord> = Vec::new();
        for size in &sizes {
            candidates.extend(catalog.records_for_size(*size)?);
        }
        log::info!(
            "Size filter: {} of {} files share a size with another file",
            candidates.len(),
            stats.total_files
        );

        let results = self.fingerprint_all(&candidates);

        if self.config.is_shutdown_requested() {
            log::info!("Grouping interrupted by shutdown signal");
            return Err(FinderError::Interrupted);
        }

        for (record, result) in candidates.iter().zip(results) {
            match result {
                Ok(fingerprint) => {
                    catalog.set_fingerprint(record.id, &fingerprint)?;
                    stats.fingerprinted_files += 1;
                }
                Err(HashError::Interrupted(_)) => return Err(FinderError::Interrupted),
                Err(e) => {
                    log::warn!("Excluding {}: {}", record.path().display(), e);
                    stats.failed_files += 1;
                    stats.errors.push(e.to_string());
                }
            }
        }

        let mut classes = partition_records(catalog.groups_with_multiple_fingerprints()?);
        for class in &mut classes {
            for dup in &mut class.duplicates {
                catalog.mark_duplicate(dup.id)?;
                dup.is_duplicate = true;
            }
            stats.duplicate_files += class.duplicate_count();
            stats.reclaimable_space += class.wasted_space();
        }
        stats.duplicate_groups = classes.len();

        log::info!(
            "Grouping complete: {} groups, {} duplicates, {} reclaimable ({:.1}% of files never read)",
            stats.duplicate_groups,
            stats.duplicate_files,
            bytesize::ByteSize::b(stats.reclaimable_space),
            stats.elimination_rate()
        );
        Ok((classes, stats))
    }

    /// Fingerprint every candidate on a bounded pool, preserving order.
    fn fingerprint_all(&self, candidates: &[CatalogRecord]) -> Vec<Result<Hash, HashError>> {
        if candidates.is_empty() {
            return Vec::new();
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("fingerprint", candidates.len());
        }

        let work = || {
            candidates
                .par_iter()
                .enumerate()
                .map(|(idx, record)| {
                    let path = record.path();
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(idx + 1, path.to_string_lossy().as_ref());
                    }
                    let result = self.hasher.fingerprint(&path, record.size);
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_item_completed(record.size.min(2 * self.hasher.sample_size()));
                    }
                    result
                })
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                log::warn!(
                    "Failed to create I/O thread pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                work()
            }
        };

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("fingerprint");
        }
        results
    }
}
