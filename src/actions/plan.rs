//! Reconciliation planning.
//!
//! [`plan`] turns equivalence classes into an ordered list of
//! [`ReconciliationAction`]s. It performs no I/O, so the same input always
//! yields the same list and the list can be reviewed, rendered or stored
//! before anything touches the filesystem.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::duplicates::EquivalenceClass;

/// How duplicates are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// List every class without changing anything
    #[default]
    Check,
    /// Remove duplicates, keeping the canonical copy
    Delete,
    /// Replace duplicates with symbolic links to the canonical copy
    Softlink,
    /// Replace duplicates with hard links to the canonical copy
    Hardlink,
    /// Replace duplicates with copy-on-write clones (btrfs, XFS, APFS)
    Reflink,
}

impl ReconcileMode {
    /// Link kind used by this mode, if it links.
    #[must_use]
    pub fn link_kind(self) -> Option<LinkKind> {
        match self {
            Self::Softlink => Some(LinkKind::Soft),
            Self::Hardlink => Some(LinkKind::Hard),
            Self::Reflink => Some(LinkKind::Reflink),
            Self::Check | Self::Delete => None,
        }
    }
}

impl std::fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Check => "check",
            Self::Delete => "delete",
            Self::Softlink => "softlink",
            Self::Hardlink => "hardlink",
            Self::Reflink => "reflink",
        };
        f.write_str(name)
    }
}

/// Kind of link that replaces a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Hard link to the same inode
    Hard,
    /// Symbolic link
    Soft,
    /// Copy-on-write clone sharing storage blocks
    Reflink,
}

/// One step of a reconciliation plan.
///
/// Serialized paths are lossy: bytes that are not UTF-8 become U+FFFD. The
/// shell script rendering keeps them exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ReconciliationAction {
    /// Report a path; changes nothing.
    Announce {
        /// Path being reported
        #[serde(serialize_with = "lossy_path")]
        path: PathBuf,
    },
    /// Remove a duplicate.
    Remove {
        /// Duplicate to remove
        #[serde(serialize_with = "lossy_path")]
        path: PathBuf,
    },
    /// Replace `duplicate` with a link of `kind` to `canonical`.
    ///
    /// The executor removes `duplicate` first; a link cannot be created
    /// over an existing file.
    Link {
        /// Kind of link
        kind: LinkKind,
        /// Copy that is kept
        #[serde(serialize_with = "lossy_path")]
        canonical: PathBuf,
        /// Copy that is replaced
        #[serde(serialize_with = "lossy_path")]
        duplicate: PathBuf,
    },
}

fn lossy_path<S: serde::Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

impl ReconciliationAction {
    /// Whether executing this action changes the filesystem.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Announce { .. })
    }
}

/// Build the action list for `classes` under `mode`.
///
/// Classes are visited in fingerprint order. In `Check` mode each class
/// announces its canonical copy followed by its duplicates. In `Delete`
/// mode every duplicate is removed. Link modes replace every duplicate with
/// a link to the canonical copy.
#[must_use]
pub fn plan(classes: &[EquivalenceClass], mode: ReconcileMode) -> Vec<ReconciliationAction> {
    let mut ordered: Vec<&EquivalenceClass> = classes.iter().collect();
    ordered.sort_by(|a, b| {
        a.fingerprint
            .cmp(&b.fingerprint)
            .then(a.size.cmp(&b.size))
            .then(a.canonical.id.cmp(&b.canonical.id))
    });

    let mut actions = Vec::new();
    for class in ordered {
        let canonical = class.canonical_path();
        match mode {
            ReconcileMode::Check => {
                actions.push(ReconciliationAction::Announce { path: canonical });
                actions.extend(
                    class
                        .duplicate_paths()
                        .into_iter()
                        .map(|path| ReconciliationAction::Announce { path }),
                );
            }
            ReconcileMode::Delete => {
                actions.extend(
                    class
                        .duplicate_paths()
                        .into_iter()
                        .map(|path| ReconciliationAction::Remove { path }),
                );
            }
            ReconcileMode::Softlink | ReconcileMode::Hardlink | ReconcileMode::Reflink => {
                let Some(kind) = mode.link_kind() else {
                    continue;
                };
                actions.extend(class.duplicate_paths().into_iter().map(|duplicate| {
                    ReconciliationAction::Link {
                        kind,
                        canonical: canonical.clone(),
                        duplicate,
                    }
                }));
            }
        }
    }
    actions
}
