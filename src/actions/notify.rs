//! Search-index notification.
//!
//! Media servers keep their own index of the photo tree. After the relocator
//! creates a directory or moves a file it tells the index through an
//! [`IndexNotifier`]. Notification is best effort: callers log failures and
//! carry on.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// A change the index should learn about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// A directory was created.
    DirectoryAdded(PathBuf),
    /// A file appeared.
    FileAdded(PathBuf),
    /// A file moved from `old` to `new`.
    Renamed {
        /// New location
        new: PathBuf,
        /// Previous location
        old: PathBuf,
    },
}

impl IndexEvent {
    /// Command-line arguments in `synoindex` convention.
    #[must_use]
    pub fn args(&self) -> Vec<&Path> {
        match self {
            Self::DirectoryAdded(path) => vec![Path::new("-A"), path],
            Self::FileAdded(path) => vec![Path::new("-a"), path],
            Self::Renamed { new, old } => vec![Path::new("-n"), new, old],
        }
    }
}

/// Errors from an index notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notifier program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The notifier exited unsuccessfully.
    #[error("{program} exited with {status}")]
    Failed {
        /// Program name
        program: String,
        /// Exit status description
        status: String,
    },
}

/// Receives index events.
pub trait IndexNotifier: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the event could not be delivered.
    fn notify(&self, event: &IndexEvent) -> Result<(), NotifyError>;
}

/// Notifier that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl IndexNotifier for NoopNotifier {
    fn notify(&self, event: &IndexEvent) -> Result<(), NotifyError> {
        log::trace!("Index notification suppressed: {:?}", event);
        Ok(())
    }
}

/// Notifier that runs an external program per event.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    /// Default program on Synology NAS systems.
    pub const DEFAULT_PROGRAM: &'static str = "synoindex";

    /// Create a notifier running `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The program this notifier runs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for CommandNotifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM)
    }
}

impl IndexNotifier for CommandNotifier {
    fn notify(&self, event: &IndexEvent) -> Result<(), NotifyError> {
        let args = event.args();
        log::debug!(
            "{} {}",
            self.program,
            args.iter()
                .map(|a| a.display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|source| NotifyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}
