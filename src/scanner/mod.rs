//! Scanner module for directory traversal, fingerprinting and date lookup.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Sampled content fingerprints with BLAKE3
//! - Capture-date extraction from file names and EXIF metadata
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Sampled fingerprints
//! - [`date`]: Capture date lookup used by the relocation workflow
//!
//! # Example
//!
//! ```no_run
//! use dupsort::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod date;
pub mod hasher;
pub mod walker;

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

// Re-export main types
pub use date::{
    CaptureDate, ChainedDateExtractor, DateExtractor, ExifDateExtractor, FilenameDateExtractor,
};
pub use hasher::{
    hash_to_hex, hex_to_hash, Hash, Hasher, DEDUPE_SAMPLE_SIZE, MOVE_SAMPLE_SIZE,
};
pub use walker::Walker;

/// Directory names skipped by default: NAS thumbnail stores and VCS metadata.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["@eaDir", ".git", ".svn"];

/// Metadata for a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Whether this entry is a symbolic link
    pub is_symlink: bool,
}

impl FileEntry {
    /// Create a new FileEntry for a regular file.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            is_symlink: false,
        }
    }

    /// Directory containing the file, or an empty path for bare names.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// File name component, byte-exact.
    #[must_use]
    pub fn name(&self) -> OsString {
        self.path.file_name().map(OsStr::to_os_string).unwrap_or_default()
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Directory names whose whole subtree is skipped.
    pub excluded_dirs: Vec<String>,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,

    /// Report symbolic links instead of silently dropping them.
    /// Links are never followed.
    pub include_symlinks: bool,

    /// Report zero-byte files instead of silently dropping them.
    pub include_empty: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| (*s).to_string()).collect(),
            ignore_patterns: Vec::new(),
            include_symlinks: false,
            include_empty: false,
        }
    }
}

impl WalkerConfig {
    /// Add gitignore-style patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Report every regular file, including empty ones.
    #[must_use]
    pub fn with_empty_files(mut self, include: bool) -> Self {
        self.include_empty = include;
        self
    }

    /// Whether a single path component names an excluded directory.
    #[must_use]
    pub fn is_excluded_dir_name(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for a path.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Shutdown was requested while the file was being read.
    #[error("Interrupted while reading {0}")]
    Interrupted(PathBuf),
}

impl HashError {
    /// Classify an I/O error for a path.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// The file this error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Interrupted(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
