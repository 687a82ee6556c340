//! Ctrl+C handling.
//!
//! A single `Arc<AtomicBool>` is shared by the walker, the fingerprinting
//! pool and the relocator. The signal handler only sets it; long-running
//! loops poll it and wind down on their own, so the catalog is never left
//! mid-transaction.
//!
//! ```rust,no_run
//! use dupsort::duplicates::FinderConfig;
//! use dupsort::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = FinderConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit status after an interrupt (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag, for handing to workers.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Failure to install the signal hook.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// `ctrlc` refused the handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Hook Ctrl+C (and SIGTERM) to a process-wide [`ShutdownHandler`].
///
/// Later calls return the same handler with its flag cleared, so
/// `run_app` can be invoked repeatedly in one process (as tests do).
///
/// # Errors
///
/// Returns [`SignalError`] if the hook cannot be installed and no handler
/// exists yet.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted. Finishing current file...");
        let _ = stderr.flush();
    });

    match installed {
        Ok(()) => Ok(GLOBAL_HANDLER.get_or_init(|| handler).clone()),
        Err(ctrlc::Error::MultipleHandlers) => {
            // Another thread won the race; share its handler.
            log::debug!("Ctrl+C handler already registered");
            Ok(GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handler_is_clear() {
        assert!(!ShutdownHandler::new().is_shutdown_requested());
    }

    #[test]
    fn test_request_and_reset() {
        let handler = ShutdownHandler::new();
        handler.request_shutdown();
        assert!(handler.is_shutdown_requested());
        handler.reset();
        assert!(!handler.is_shutdown_requested());
    }

    #[test]
    fn test_flag_is_shared() {
        let handler = ShutdownHandler::new();
        let flag = handler.get_flag();
        let clone = handler.clone();

        flag.store(true, Ordering::SeqCst);
        assert!(handler.is_shutdown_requested());
        assert!(clone.is_shutdown_requested());
    }

    #[test]
    fn test_install_handler_is_reusable() {
        let first = install_handler().unwrap();
        first.request_shutdown();
        let second = install_handler().unwrap();
        assert!(!second.is_shutdown_requested());
        assert!(!first.is_shutdown_requested());
    }

    #[test]
    fn test_exit_code_interrupted() {
        assert_eq!(EXIT_CODE_INTERRUPTED, 130);
    }
}
