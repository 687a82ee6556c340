//! JSON output formatter for dedupe runs.
//!
//! Provides machine-readable output for scripting and automation. JSON
//! strings are UTF-8, so paths are rendered lossily: bytes that are not
//! valid UTF-8 become U+FFFD. Use the shell script output when exact
//! paths matter.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "mode": "hardlink",
//!   "generated_at": "2024-01-15T10:30:00+01:00",
//!   "classes": [
//!     {
//!       "fingerprint": "abc123...",
//!       "size": 1024,
//!       "canonical": "/photos/a.jpg",
//!       "duplicates": ["/photos/b.jpg"]
//!     }
//!   ],
//!   "actions": [
//!     { "action": "link", "kind": "hard", "canonical": "/photos/a.jpg", "duplicate": "/photos/b.jpg" }
//!   ],
//!   "summary": {
//!     "total_files": 100,
//!     "duplicate_groups": 1,
//!     "...": "..."
//!   }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::actions::{ReconcileMode, ReconciliationAction};
use crate::duplicates::{EquivalenceClass, ScanSummary};
use crate::error::ExitCode;

/// One equivalence class in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonClass {
    /// Fingerprint as hexadecimal string (64 characters)
    pub fingerprint: String,
    /// File size in bytes
    pub size: u64,
    /// Copy that is kept
    pub canonical: String,
    /// Copies that are duplicates of it
    pub duplicates: Vec<String>,
}

impl JsonClass {
    /// Convert an [`EquivalenceClass`].
    #[must_use]
    pub fn from_class(class: &EquivalenceClass) -> Self {
        Self {
            fingerprint: class.fingerprint_hex(),
            size: class.size,
            canonical: class.canonical_path().to_string_lossy().into_owned(),
            duplicates: class
                .duplicate_paths()
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files recorded in the catalog
    pub total_files: usize,
    /// Combined size of catalogued files in bytes
    pub total_size: u64,
    /// Files that needed a fingerprint
    pub fingerprinted_files: usize,
    /// Files that could not be fingerprinted
    pub failed_files: usize,
    /// Number of equivalence classes
    pub duplicate_groups: usize,
    /// Number of duplicates (excluding canonical copies)
    pub duplicate_files: usize,
    /// Bytes reclaimable by removing every duplicate
    pub reclaimable_space: u64,
    /// Errors encountered while walking
    pub scan_errors: usize,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a [`ScanSummary`] and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            fingerprinted_files: summary.grouping.fingerprinted_files,
            failed_files: summary.grouping.failed_files,
            duplicate_groups: summary.grouping.duplicate_groups,
            duplicate_files: summary.grouping.duplicate_files,
            reclaimable_space: summary.grouping.reclaimable_space,
            scan_errors: summary.scan_errors.len(),
            duration_ms: summary.duration.as_millis() as u64,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Reconciliation mode
    pub mode: ReconcileMode,
    /// When the document was produced (RFC 3339)
    pub generated_at: String,
    /// Equivalence classes found
    pub classes: Vec<JsonClass>,
    /// Planned actions in execution order
    pub actions: Vec<ReconciliationAction>,
    /// Run statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the document for one dedupe run.
    ///
    /// # Example
    ///
    /// ```
    /// use dupsort::actions::ReconcileMode;
    /// use dupsort::duplicates::ScanSummary;
    /// use dupsort::error::ExitCode;
    /// use dupsort::output::json::JsonOutput;
    ///
    /// let output = JsonOutput::new(&[], &[], ReconcileMode::Check, &ScanSummary::default(), ExitCode::Success);
    /// assert!(output.classes.is_empty());
    /// assert!(output.to_json().unwrap().starts_with('{'));
    /// ```
    #[must_use]
    pub fn new(
        classes: &[EquivalenceClass],
        actions: &[ReconciliationAction],
        mode: ReconcileMode,
        summary: &ScanSummary,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            mode,
            generated_at: chrono::Local::now().to_rfc3339(),
            classes: classes.iter().map(JsonClass::from_class).collect(),
            actions: actions.to_vec(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
