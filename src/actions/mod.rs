//! Actions that decide or perform changes to the filesystem.
//!
//! - [`conflict`]: is a destination safe to write over?
//! - [`plan`]: turn duplicate groups into a reviewable action list
//! - [`relocate`]: move files into a dated layout without losing data
//! - [`notify`]: tell an external search index about changes
//!
//! ```no_run
//! use dupsort::actions::{check_conflict, RelocationDecision};
//! use dupsort::scanner::{Hasher, MOVE_SAMPLE_SIZE};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(MOVE_SAMPLE_SIZE);
//! let decision = check_conflict(Path::new("in/a.jpg"), Path::new("out/a.jpg"), &hasher).unwrap();
//! if decision == RelocationDecision::Safe {
//!     println!("nothing there yet");
//! }
//! ```

pub mod conflict;
pub mod notify;
pub mod plan;
pub mod relocate;

pub use conflict::{check_conflict, ConflictReason, RelocationDecision};
pub use notify::{CommandNotifier, IndexEvent, IndexNotifier, NoopNotifier, NotifyError};
pub use plan::{plan, LinkKind, ReconcileMode, ReconciliationAction};
pub use relocate::{
    create_missing_dirs, RelocateError, RelocationOutcome, RelocationReport, Relocator,
    RelocatorConfig,
};
