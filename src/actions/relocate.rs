//! Conflict-checked file relocation.
//!
//! # Overview
//!
//! The [`Relocator`] moves a file into a destination directory without ever
//! overwriting different content:
//!
//! 1. Missing directories of the destination chain are created outermost
//!    first, each one announced to the search index.
//! 2. [`check_conflict`] inspects the destination. A conflict leaves both
//!    files untouched and is reported as [`RelocationOutcome::Rejected`].
//! 3. The file moves (rename, falling back to copy and remove across
//!    devices), then its thumbnail sidecar under `@eaDir/<name>` follows it.
//! 4. The index is told about the new file.
//!
//! [`Relocator::relocate_tree`] applies this to every dated file under a
//! source root, sorting them into `<root>/<yyyy>/<mm>/`.
//!
//! # Example
//!
//! ```no_run
//! use dupsort::actions::relocate::{Relocator, RelocatorConfig};
//! use std::path::Path;
//!
//! let relocator = Relocator::new(RelocatorConfig::default().with_ignore_index(true));
//! let report = relocator
//!     .relocate_tree(Path::new("/volume1/upload"), Path::new("/volume1/photo"))
//!     .unwrap();
//! println!("{}", report.summary());
//! ```

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::conflict::{check_conflict, ConflictReason, RelocationDecision};
use super::notify::{IndexEvent, IndexNotifier, NoopNotifier};
use crate::progress::ProgressCallback;
use crate::scanner::{
    ChainedDateExtractor, DateExtractor, HashError, Hasher, Walker, WalkerConfig,
    MOVE_SAMPLE_SIZE,
};

/// Directory holding per-file thumbnail sidecars.
pub const SIDECAR_DIR: &str = "@eaDir";

/// Errors that stop a single relocation.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// A destination directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        /// Directory being created
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file could not be moved.
    #[error("cannot move {from} to {to}: {source}")]
    Move {
        /// Source path
        from: PathBuf,
        /// Destination path
        to: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Source or destination could not be fingerprinted.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Source and destination roots are the same directory.
    #[error("source and destination directory can not be the same: {0}")]
    SameRoot(PathBuf),

    /// The source root is missing or not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl RelocateError {
    /// Whether this error was caused by a shutdown request.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Hash(HashError::Interrupted(_)))
    }
}

/// Result of relocating one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelocationOutcome {
    /// The file now lives at `to`.
    Moved {
        /// Previous location
        from: PathBuf,
        /// New location
        to: PathBuf,
        /// Whether a thumbnail sidecar moved with it
        sidecar_moved: bool,
        /// Whether an identical copy at `to` was replaced
        replaced_identical: bool,
    },
    /// `to` is already the same file as `from`, reached through another
    /// path (a symlinked root or a hard link); nothing was changed.
    AlreadyInPlace {
        /// Path the file was found under
        from: PathBuf,
        /// Destination naming the same file
        to: PathBuf,
    },
    /// The destination holds different content; nothing was changed.
    Rejected {
        /// File that stayed put
        from: PathBuf,
        /// Occupied destination
        to: PathBuf,
        /// Why the destination was unsafe
        reason: ConflictReason,
    },
}

impl RelocationOutcome {
    /// Whether the file was moved.
    #[must_use]
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// Totals for a [`Relocator::relocate_tree`] run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelocationReport {
    /// Files moved, as (from, to)
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Conflicts that need manual attention
    pub rejected: Vec<RelocationOutcome>,
    /// Files with no capture date, or already in place
    pub skipped: usize,
    /// Files that failed with an error, with the message
    pub failed: Vec<(PathBuf, String)>,
    /// Whether the run stopped early on shutdown
    pub interrupted: bool,
}

impl RelocationReport {
    /// Whether any file was rejected or failed.
    #[must_use]
    pub fn has_problems(&self) -> bool {
        !self.rejected.is_empty() || !self.failed.is_empty()
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} moved, {} conflicts, {} skipped, {} failed",
            self.moved.len(),
            self.rejected.len(),
            self.skipped,
            self.failed.len()
        )
    }
}

/// Settings for a [`Relocator`].
#[derive(Debug, Clone)]
pub struct RelocatorConfig {
    /// Fingerprint sample size for conflict checks.
    pub sample_size: u64,
    /// Suppress every index notification.
    pub ignore_index: bool,
    /// Walker settings for [`Relocator::relocate_tree`].
    pub walker_config: WalkerConfig,
    /// Optional shutdown flag.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for RelocatorConfig {
    fn default() -> Self {
        Self {
            sample_size: MOVE_SAMPLE_SIZE,
            ignore_index: false,
            walker_config: WalkerConfig::default().with_empty_files(true),
            shutdown_flag: None,
        }
    }
}

impl RelocatorConfig {
    /// Set the conflict-check sample size.
    #[must_use]
    pub fn with_sample_size(mut self, bytes: u64) -> Self {
        self.sample_size = bytes;
        self
    }

    /// Suppress index notifications.
    #[must_use]
    pub fn with_ignore_index(mut self, ignore: bool) -> Self {
        self.ignore_index = ignore;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

/// Moves files into place without losing data.
pub struct Relocator {
    config: RelocatorConfig,
    hasher: Hasher,
    notifier: Box<dyn IndexNotifier>,
    dates: Box<dyn DateExtractor>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Relocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relocator")
            .field("config", &self.config)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl Relocator {
    /// Create a relocator with a no-op notifier and the default date chain.
    #[must_use]
    pub fn new(config: RelocatorConfig) -> Self {
        let mut hasher = Hasher::new(config.sample_size);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(flag.clone());
        }
        Self {
            config,
            hasher,
            notifier: Box::new(NoopNotifier),
            dates: Box::new(ChainedDateExtractor::default()),
            progress_callback: None,
        }
    }

    /// Use `notifier` for index events.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn IndexNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use `extractor` to date files in [`Relocator::relocate_tree`].
    #[must_use]
    pub fn with_date_extractor(mut self, extractor: Box<dyn DateExtractor>) -> Self {
        self.dates = extractor;
        self
    }

    /// Report per-file progress.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn notify(&self, event: IndexEvent) {
        if self.config.ignore_index {
            return;
        }
        if let Err(e) = self.notifier.notify(&event) {
            log::warn!("Index notification failed: {}", e);
        }
    }

    /// Create every missing directory of `dir`, announcing each one.
    ///
    /// # Errors
    ///
    /// Returns [`RelocateError::CreateDir`] if a directory cannot be created.
    pub fn ensure_dir_chain(&self, dir: &Path) -> Result<Vec<PathBuf>, RelocateError> {
        let created = create_missing_dirs(dir)?;
        for path in &created {
            log::debug!("Created {}", path.display());
            self.notify(IndexEvent::DirectoryAdded(path.clone()));
        }
        Ok(created)
    }

    /// Move `source` to `dest_dir/file_name`, unless that would lose data.
    ///
    /// # Errors
    ///
    /// Returns [`RelocateError`] if directories cannot be created, either
    /// file cannot be read for the conflict check, or the move fails.
    /// A conflicting destination is not an error; it comes back as
    /// [`RelocationOutcome::Rejected`]. A destination that is already the
    /// same file comes back as [`RelocationOutcome::AlreadyInPlace`].
    pub fn relocate(
        &self,
        source: &Path,
        dest_dir: &Path,
        file_name: &OsStr,
    ) -> Result<RelocationOutcome, RelocateError> {
        let dest = dest_dir.join(file_name);
        if same_file(source, &dest) {
            log::debug!("{} is already at {}", source.display(), dest.display());
            return Ok(RelocationOutcome::AlreadyInPlace {
                from: source.to_path_buf(),
                to: dest,
            });
        }
        self.ensure_dir_chain(dest_dir)?;

        let decision = check_conflict(source, &dest, &self.hasher)?;
        let replaced_identical = match decision {
            RelocationDecision::Conflict(reason) => {
                log::warn!(
                    "Found conflict file {} {} ({})",
                    source.display(),
                    dest.display(),
                    reason
                );
                return Ok(RelocationOutcome::Rejected {
                    from: source.to_path_buf(),
                    to: dest,
                    reason,
                });
            }
            RelocationDecision::IdenticalExists => true,
            RelocationDecision::Safe => false,
        };

        move_path(source, &dest)?;
        log::info!("{} ==> {}", source.display(), dest.display());

        let sidecar_moved = match self.move_sidecar(source, dest_dir, file_name) {
            Ok(moved) => moved,
            Err(e) => {
                log::warn!("Thumbnail for {} left behind: {}", source.display(), e);
                false
            }
        };

        if sidecar_moved {
            self.notify(IndexEvent::Renamed {
                new: dest.clone(),
                old: source.to_path_buf(),
            });
        } else {
            self.notify(IndexEvent::FileAdded(dest.clone()));
        }

        Ok(RelocationOutcome::Moved {
            from: source.to_path_buf(),
            to: dest,
            sidecar_moved,
            replaced_identical,
        })
    }

    /// Move `<source dir>/@eaDir/<source name>` to `dest_dir/@eaDir/file_name`.
    fn move_sidecar(
        &self,
        source: &Path,
        dest_dir: &Path,
        file_name: &OsStr,
    ) -> Result<bool, RelocateError> {
        let (Some(parent), Some(name)) = (source.parent(), source.file_name()) else {
            return Ok(false);
        };
        let old_sidecar = parent.join(SIDECAR_DIR).join(name);
        if !old_sidecar.is_dir() {
            return Ok(false);
        }

        let sidecar_root = dest_dir.join(SIDECAR_DIR);
        fs::create_dir_all(&sidecar_root).map_err(|source| RelocateError::CreateDir {
            path: sidecar_root.clone(),
            source,
        })?;

        let new_sidecar = sidecar_root.join(file_name);
        if same_file(&old_sidecar, &new_sidecar) {
            return Ok(false);
        }
        if let Ok(meta) = fs::symlink_metadata(&new_sidecar) {
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&new_sidecar)
            } else {
                fs::remove_file(&new_sidecar)
            };
            removed.map_err(|source| RelocateError::Move {
                from: old_sidecar.clone(),
                to: new_sidecar.clone(),
                source,
            })?;
        }

        move_path(&old_sidecar, &new_sidecar)?;
        log::debug!("{} --> {}", old_sidecar.display(), new_sidecar.display());
        Ok(true)
    }

    /// Sort every dated file under `src_root` into `<dst_root>/<yyyy>/<mm>/`.
    ///
    /// Per-file failures and conflicts are collected in the report; the
    /// walk continues with the next file.
    ///
    /// # Errors
    ///
    /// Returns [`RelocateError::SameRoot`] when both roots are the same
    /// directory and [`RelocateError::NotADirectory`] when `src_root` is not
    /// a directory.
    pub fn relocate_tree(
        &self,
        src_root: &Path,
        dst_root: &Path,
    ) -> Result<RelocationReport, RelocateError> {
        if !src_root.is_dir() {
            return Err(RelocateError::NotADirectory(src_root.to_path_buf()));
        }
        if same_dir(src_root, dst_root) {
            return Err(RelocateError::SameRoot(src_root.to_path_buf()));
        }

        let mut report = RelocationReport::default();
        let mut walker = Walker::new(src_root, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("relocate", 0);
        }

        for (idx, result) in walker.walk().enumerate() {
            if self.is_shutdown_requested() {
                report.interrupted = true;
                break;
            }
            let file = match result {
                Ok(file) => file,
                Err(e) => {
                    log::warn!("Walk error: {}", e);
                    report.failed.push((PathBuf::from(src_root), e.to_string()));
                    continue;
                }
            };
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(idx + 1, file.path.to_string_lossy().as_ref());
            }

            let Some(date) = self.dates.extract_date(&file.path) else {
                log::debug!("No capture date: {}", file.path.display());
                report.skipped += 1;
                continue;
            };

            let name = file.name();
            let dest_dir = dst_root.join(date.year_dir()).join(date.month_dir());
            match self.relocate(&file.path, &dest_dir, &name) {
                Ok(RelocationOutcome::Moved { from, to, .. }) => report.moved.push((from, to)),
                Ok(RelocationOutcome::AlreadyInPlace { .. }) => report.skipped += 1,
                Ok(rejected) => report.rejected.push(rejected),
                Err(e) if e.is_interrupted() => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    log::warn!("Failed to relocate {}: {}", file.path.display(), e);
                    report.failed.push((file.path.clone(), e.to_string()));
                }
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("relocate");
        }

        log::info!("Relocation complete: {}", report.summary());
        Ok(report)
    }
}

/// Create the missing directories of `dir`, outermost first.
///
/// Returns the directories that were created. A directory that appears
/// concurrently is treated as created by someone else.
///
/// # Errors
///
/// Returns [`RelocateError::CreateDir`] if a directory cannot be created.
pub fn create_missing_dirs(dir: &Path) -> Result<Vec<PathBuf>, RelocateError> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current {
        if path.as_os_str().is_empty() || path.is_dir() {
            break;
        }
        missing.push(path.to_path_buf());
        current = path.parent();
    }

    let mut created = Vec::with_capacity(missing.len());
    for path in missing.into_iter().rev() {
        match fs::create_dir(&path) {
            Ok(()) => created.push(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(source) => return Err(RelocateError::CreateDir { path, source }),
        }
    }
    Ok(created)
}

/// Rename `from` to `to`, copying then removing when rename fails
/// (e.g. across filesystems).
fn move_path(from: &Path, to: &Path) -> Result<(), RelocateError> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    log::debug!(
        "rename {} failed ({}), copying instead",
        from.display(),
        rename_err
    );

    let move_err = |source| RelocateError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let meta = fs::symlink_metadata(from).map_err(move_err)?;
    if meta.is_dir() {
        copy_dir(from, to).map_err(move_err)?;
        fs::remove_dir_all(from).map_err(move_err)?;
    } else {
        if fs::copy(from, to).is_err() {
            return Err(move_err(rename_err));
        }
        fs::remove_file(from).map_err(move_err)?;
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Whether `a` and `b` name the same file on the same device.
///
/// Missing paths never match. The last component is not followed, so a
/// symlink is not the same file as its target.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
