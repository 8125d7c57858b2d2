//! Tree diff: turns a source and a replica snapshot into an ordered plan of
//! create / update / delete operations.
//!
//! Ordering contract:
//! - deletions run first, deepest path first, so children go before parents;
//! - creations and updates run second, shallowest path first, so parents exist
//!   before anything is placed inside them.
//!
//! An orphaned replica directory is removed as a whole; orphans below it are
//! folded into that single delete.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::sync::checksum::ContentComparer;
use crate::sync::snapshot::{DirectorySnapshot, EntryKind};

/// Operation category, as it appears in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        })
    }
}

/// One change to apply to the replica. Paths are relative to the roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
    /// Create a directory or copy a file that the replica lacks.
    Create { path: PathBuf, kind: EntryKind },
    /// Overwrite a replica file with the source file's full content.
    UpdateContent { path: PathBuf },
    /// Remove a replica entry (recursively for directories).
    Delete { path: PathBuf, kind: EntryKind },
}

impl SyncOperation {
    pub fn path(&self) -> &Path {
        match self {
            Self::Create { path, .. }
            | Self::UpdateContent { path }
            | Self::Delete { path, .. } => path,
        }
    }

    pub const fn operation_kind(&self) -> OperationKind {
        match self {
            Self::Create { .. } => OperationKind::Create,
            Self::UpdateContent { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
        }
    }

    pub const fn entry_kind(&self) -> EntryKind {
        match self {
            Self::Create { kind, .. } | Self::Delete { kind, .. } => *kind,
            Self::UpdateContent { .. } => EntryKind::File,
        }
    }

    /// Number of path components.
    pub fn depth(&self) -> usize {
        self.path().components().count()
    }
}

/// The ordered set of operations for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub deletions: Vec<SyncOperation>,
    pub upserts: Vec<SyncOperation>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.upserts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deletions.len() + self.upserts.len()
    }

    /// All operations in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &SyncOperation> {
        self.deletions.iter().chain(self.upserts.iter())
    }
}

/// Compute the operations that make `replica` an exact copy of `source`.
pub fn diff(
    source: &DirectorySnapshot,
    replica: &DirectorySnapshot,
    comparer: &dyn ContentComparer,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    // Replica directories scheduled for removal; anything below them goes too.
    let mut removed: HashSet<PathBuf> = HashSet::new();

    for (path, src) in source.entries() {
        match replica.get(path) {
            None => plan.upserts.push(SyncOperation::Create {
                path: path.clone(),
                kind: src.kind,
            }),
            Some(rep) if rep.kind == src.kind => {
                if src.kind == EntryKind::File && comparer.differs(path, src, rep) {
                    plan.upserts
                        .push(SyncOperation::UpdateContent { path: path.clone() });
                }
            }
            Some(rep) => {
                // Kind changed: replace, never merge.
                plan.deletions.push(SyncOperation::Delete {
                    path: path.clone(),
                    kind: rep.kind,
                });
                if rep.kind == EntryKind::Directory {
                    removed.insert(path.clone());
                }
                plan.upserts.push(SyncOperation::Create {
                    path: path.clone(),
                    kind: src.kind,
                });
            }
        }
    }

    for (path, rep) in replica.entries() {
        if source.contains(path) || source.is_unknown(path) {
            continue;
        }
        if path.ancestors().skip(1).any(|a| removed.contains(a)) {
            continue;
        }
        plan.deletions.push(SyncOperation::Delete {
            path: path.clone(),
            kind: rep.kind,
        });
        if rep.kind == EntryKind::Directory {
            removed.insert(path.clone());
        }
    }

    plan.deletions.sort_by(|a, b| {
        b.depth()
            .cmp(&a.depth())
            .then_with(|| a.path().cmp(b.path()))
    });
    plan.upserts.sort_by(|a, b| {
        a.depth()
            .cmp(&b.depth())
            .then_with(|| a.path().cmp(b.path()))
    });

    plan
}
