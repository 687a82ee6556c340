//! Renderers for reconciliation plans.
//!
//! The planner produces [`ReconciliationAction`](crate::actions::ReconciliationAction)s;
//! these formatters turn them into something a person or a program can act on:
//! - a POSIX shell script for review and later execution
//! - JSON for automation
//!
//! # Example
//!
//! ```no_run
//! use dupsort::actions::{plan, ReconcileMode};
//! use dupsort::catalog::Catalog;
//! use dupsort::duplicates::DuplicateFinder;
//! use dupsort::output::ScriptOutput;
//! use std::path::Path;
//!
//! let catalog = Catalog::open_in_memory().unwrap();
//! let finder = DuplicateFinder::with_defaults();
//! let (classes, _summary) = finder.find_duplicates(Path::new("."), &catalog).unwrap();
//!
//! let actions = plan(&classes, ReconcileMode::Check);
//! ScriptOutput::new(&actions, ReconcileMode::Check)
//!     .write_to(&mut std::io::stdout())
//!     .unwrap();
//! ```

pub mod json;
pub mod script;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use json::{JsonOutput, JsonOutputError};
pub use script::{escape_posix, ScriptOutput};

/// Plan output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// POSIX shell script
    #[default]
    Sh,
    /// JSON document
    Json,
}
