//! Catalog row model.

use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::{hash_to_hex, Hash};

/// One catalogued file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Internal row id, increasing in insertion order
    pub id: i64,
    /// Directory containing the file
    pub dir: PathBuf,
    /// File name within `dir`, byte-exact
    pub name: OsString,
    /// Size in bytes captured during the scan
    pub size: u64,
    /// Content fingerprint, if one has been computed
    pub fingerprint: Option<Hash>,
    /// Whether grouping marked this file as a non-canonical copy
    pub is_duplicate: bool,
}

impl CatalogRecord {
    /// Full path of the file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Fingerprint as hex, if present.
    #[must_use]
    pub fn fingerprint_hex(&self) -> Option<String> {
        self.fingerprint.as_ref().map(hash_to_hex)
    }
}
