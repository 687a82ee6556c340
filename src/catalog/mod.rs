//! File catalog for duplicate detection.
//!
//! The catalog is a single SQLite table of every file seen by the scan pass.
//! It is the shared state between the scan pass and the grouping pass, and
//! the only place fingerprints and duplicate flags are recorded.
//!
//! # Architecture
//!
//! * [`database`]: SQLite persistence, schema and grouped queries.
//! * [`entry`]: The [`CatalogRecord`] row model.
//!
//! # Lifetime
//!
//! A catalog belongs to exactly one run. [`Catalog::create`] removes any
//! previous catalog file at the same path, so results from an earlier run
//! over a different root are never mixed in. Tests use
//! [`Catalog::open_in_memory`] so each gets an isolated store.

pub mod database;
pub mod entry;

pub use database::{Catalog, CatalogError, CatalogResult};
pub use entry::CatalogRecord;
