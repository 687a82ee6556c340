//! Exit codes and structured error reporting.

use serde::Serialize;
use thiserror::Error;

use crate::actions::RelocateError;
use crate::duplicates::FinderError;

/// Process exit codes.
///
/// - 0: completed, nothing needs attention
/// - 1: fatal error (catalog failure, unreadable root, ...)
/// - 2: usage error
/// - 3: completed, but at least one file was rejected, conflicted or failed
/// - 130: interrupted (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// Fatal error.
    GeneralError = 1,
    /// Bad invocation.
    UsageError = 2,
    /// Completed with per-file problems.
    PartialSuccess = 3,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit status.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DS000",
            Self::GeneralError => "DS001",
            Self::UsageError => "DS002",
            Self::PartialSuccess => "DS003",
            Self::Interrupted => "DS130",
        }
    }

    /// Exit code for an error returned by `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<UsageError>().is_some() {
            return Self::UsageError;
        }
        if let Some(FinderError::Interrupted) = err.downcast_ref::<FinderError>() {
            return Self::Interrupted;
        }
        match err.downcast_ref::<RelocateError>() {
            Some(RelocateError::SameRoot(_)) => Self::UsageError,
            Some(e) if e.is_interrupted() => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// An invocation that makes no sense, caught after argument parsing.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// Error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Machine-readable code (e.g. "DS001")
    pub code: String,
    /// Numeric exit status
    pub exit_code: i32,
    /// Human-readable message, including causes
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Describe `err` with `exit_code`.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
