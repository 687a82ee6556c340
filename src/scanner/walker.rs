//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory tree
//! and collecting the regular files beneath it. Subtrees named in
//! [`WalkerConfig::excluded_dirs`] (thumbnail stores, VCS metadata) are
//! pruned before they are read.
//!
//! # Features
//!
//! - Parallel directory reading using the rayon thread pool
//! - Deterministic, name-sorted output
//! - Gitignore-style pattern matching via the `ignore` crate
//! - Symbolic links are never followed
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupsort::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/volume1/photo"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileEntry, ScanError, WalkerConfig};
use crate::progress::ProgressCallback;

/// Directory walker for file discovery.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
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

    /// Build gitignore matcher from config patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Check if a file path is matched by an ignore pattern (itself or a parent).
    fn should_ignore(&self, path: &Path, gitignore: &Option<Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        gi.matched_path_or_any_parents(relative, false).is_ignore()
    }

    /// Walk the directory tree, yielding file entries.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let excluded = self.config.excluded_dirs.clone();
        let mut seen = 0usize;

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Prune excluded directories before they are descended into
                children.retain(|child| match child {
                    Ok(entry) => {
                        !(entry.file_type().is_dir()
                            && excluded
                                .iter()
                                .any(|name| entry.file_name().to_string_lossy() == name.as_str()))
                    }
                    Err(_) => true,
                });
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    let err = match e.into_io_error() {
                        Some(io_err) => ScanError::from_io(&path, io_err),
                        None => ScanError::Io {
                            path: path.clone(),
                            source: std::io::Error::other("directory walk failed"),
                        },
                    };
                    log::warn!("{}", err);
                    return Some(Err(err));
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();
            if file_type.is_dir() {
                return None;
            }

            if self.should_ignore(&path, &gitignore) {
                log::trace!("Ignoring file: {}", path.display());
                return None;
            }

            let metadata = match std::fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => return Some(Err(ScanError::from_io(&path, e))),
            };

            let is_symlink = metadata.file_type().is_symlink();
            if is_symlink && !self.config.include_symlinks {
                log::debug!("Skipping symlink: {}", path.display());
                return None;
            }
            if !is_symlink && !metadata.is_file() {
                return None;
            }

            let size = metadata.len();
            if size == 0 && !self.config.include_empty {
                log::debug!("Skipping empty file: {}", path.display());
                return None;
            }

            seen += 1;
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(seen, path.to_string_lossy().as_ref());
            }

            Some(Ok(FileEntry {
                path,
                size,
                is_symlink,
            }))
        })
    }
}
