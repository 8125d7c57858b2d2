//! Directory snapshots: a point-in-time map of relative paths to entry metadata.
//!
//! The walker is sequential and deterministic: children are visited in name
//! order and the resulting map is ordered component-wise, so a directory is
//! always followed by its descendants. Unreadable subtrees are recorded as
//! issues and marked incomplete instead of aborting the walk.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::errors::SyncError;

/// Which tree a snapshot (or walk issue) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeSide {
    Source,
    Replica,
}

impl TreeSide {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Replica => "replica",
        }
    }
}

/// Entry kind. Source snapshots only ever hold files and directories;
/// symlinks and special files show up in replica snapshots so they can be
/// removed as orphans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl EntryKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "dir",
            Self::Symlink => "symlink",
            Self::Other => "other",
        }
    }
}

/// Metadata kept per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub kind: EntryKind,
    pub size: u64,
    pub modified: SystemTime,
}

impl EntryMeta {
    fn from_metadata(kind: EntryKind, meta: &fs::Metadata) -> Self {
        Self {
            kind,
            size: if kind == EntryKind::File { meta.len() } else { 0 },
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// Why a walk skipped something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkIssueKind {
    /// Directory listing failed; its subtree is unknown this tick.
    Unreadable,
    /// Entry vanished or could not be stat'ed between listing and stat.
    Unstattable,
    /// Source symlink skipped because symlinks are not followed.
    SymlinkSkipped,
    /// Followed symlink points nowhere.
    BrokenSymlink,
    /// Followed symlink points at one of its own ancestors.
    SymlinkLoop,
    /// FIFO, socket or device node in the source tree.
    SpecialFile,
}

impl WalkIssueKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unreadable => "unreadable directory",
            Self::Unstattable => "cannot stat entry",
            Self::SymlinkSkipped => "symlink skipped",
            Self::BrokenSymlink => "broken symlink skipped",
            Self::SymlinkLoop => "symlink loop skipped",
            Self::SpecialFile => "special file skipped",
        }
    }
}

/// A non-fatal problem met during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkIssue {
    pub side: TreeSide,
    pub kind: WalkIssueKind,
    /// Path relative to the walked root.
    pub path: PathBuf,
    pub code: String,
    pub reason: String,
}

impl WalkIssue {
    fn new(side: TreeSide, kind: WalkIssueKind, path: &Path, error: &SyncError) -> Self {
        Self {
            side,
            kind,
            path: path.to_path_buf(),
            code: error.code().to_string(),
            reason: error.reason(),
        }
    }
}

/// Ordered relative path → metadata map for one tree.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    root: PathBuf,
    side: TreeSide,
    entries: BTreeMap<PathBuf, EntryMeta>,
    incomplete: BTreeSet<PathBuf>,
    issues: Vec<WalkIssue>,
}

impl DirectorySnapshot {
    /// Snapshot of a tree with no entries (missing root).
    pub fn empty(root: impl Into<PathBuf>, side: TreeSide) -> Self {
        Self {
            root: root.into(),
            side,
            entries: BTreeMap::new(),
            incomplete: BTreeSet::new(),
            issues: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn side(&self) -> TreeSide {
        self.side
    }

    pub fn get(&self, path: &Path) -> Option<&EntryMeta> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Entries in component-wise path order.
    pub fn entries(&self) -> impl Iterator<Item = (&PathBuf, &EntryMeta)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn issues(&self) -> &[WalkIssue] {
        &self.issues
    }

    /// Whether `path` lies below a directory whose listing failed, so its
    /// presence in this tree is unknown.
    pub fn is_unknown(&self, path: &Path) -> bool {
        path.ancestors()
            .skip(1)
            .any(|ancestor| self.incomplete.contains(ancestor))
    }

    /// Insert an entry directly. Used by tests and by callers that build
    /// snapshots from a listing they already hold.
    pub fn insert(&mut self, path: impl Into<PathBuf>, meta: EntryMeta) {
        self.entries.insert(path.into(), meta);
    }

    /// Mark a directory's subtree as unknown.
    pub fn mark_incomplete(&mut self, path: impl Into<PathBuf>) {
        self.incomplete.insert(path.into());
    }
}

/// Walk options.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Dereference symlinks in the source tree. Replica trees are never followed.
    pub follow_symlinks: bool,
}

/// Sequential recursive walker producing [`DirectorySnapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct SnapshotWalker {
    options: WalkOptions,
}

impl SnapshotWalker {
    pub fn new(options: WalkOptions) -> Self {
        Self { options }
    }

    /// Walk `root`. A missing root yields an empty snapshot.
    pub fn walk(&self, root: &Path, side: TreeSide) -> DirectorySnapshot {
        let mut snapshot = DirectorySnapshot::empty(root, side);
        let follow = self.follow(side);

        let meta = match metadata_for_path(root, follow) {
            Ok(m) => m,
            Err(err) if err.kind() == ErrorKind::NotFound => return snapshot,
            Err(err) => {
                let error = SyncError::from_io(root, err);
                snapshot.issues.push(WalkIssue::new(
                    side,
                    WalkIssueKind::Unreadable,
                    Path::new(""),
                    &error,
                ));
                snapshot.mark_incomplete(PathBuf::new());
                return snapshot;
            }
        };
        if !meta.is_dir() {
            let error = SyncError::NotADirectory {
                path: root.to_path_buf(),
            };
            snapshot.issues.push(WalkIssue::new(
                side,
                WalkIssueKind::Unreadable,
                Path::new(""),
                &error,
            ));
            snapshot.mark_incomplete(PathBuf::new());
            return snapshot;
        }

        let mut chain = Vec::new();
        if follow && let Ok(canonical) = fs::canonicalize(root) {
            chain.push(canonical);
        }
        self.walk_dir(root, Path::new(""), &mut chain, &mut snapshot);
        snapshot
    }

    fn follow(&self, side: TreeSide) -> bool {
        side == TreeSide::Source && self.options.follow_symlinks
    }

    fn walk_dir(
        &self,
        abs_dir: &Path,
        rel_dir: &Path,
        chain: &mut Vec<PathBuf>,
        snapshot: &mut DirectorySnapshot,
    ) {
        let side = snapshot.side;

        let reader = match fs::read_dir(abs_dir) {
            Ok(reader) => reader,
            Err(err) => {
                let error = SyncError::from_io(abs_dir, err);
                snapshot.issues.push(WalkIssue::new(
                    side,
                    WalkIssueKind::Unreadable,
                    rel_dir,
                    &error,
                ));
                snapshot.mark_incomplete(rel_dir);
                return;
            }
        };

        let mut children: Vec<fs::DirEntry> = Vec::new();
        for entry_result in reader {
            match entry_result {
                Ok(entry) => children.push(entry),
                Err(err) => {
                    // The listing broke off midway; what we have is partial.
                    let error = SyncError::from_io(abs_dir, err);
                    snapshot.issues.push(WalkIssue::new(
                        side,
                        WalkIssueKind::Unreadable,
                        rel_dir,
                        &error,
                    ));
                    snapshot.mark_incomplete(rel_dir);
                    break;
                }
            }
        }
        children.sort_by_key(fs::DirEntry::file_name);

        for entry in children {
            let abs = entry.path();
            let rel = rel_dir.join(entry.file_name());
            self.visit(&abs, &rel, chain, snapshot);
        }
    }

    fn visit(
        &self,
        abs: &Path,
        rel: &Path,
        chain: &mut Vec<PathBuf>,
        snapshot: &mut DirectorySnapshot,
    ) {
        let side = snapshot.side;

        let lmeta = match fs::symlink_metadata(abs) {
            Ok(m) => m,
            Err(err) => {
                let error = SyncError::from_io(abs, err);
                snapshot.issues.push(WalkIssue::new(
                    side,
                    WalkIssueKind::Unstattable,
                    rel,
                    &error,
                ));
                return;
            }
        };

        let file_type = lmeta.file_type();
        if file_type.is_symlink() {
            match side {
                TreeSide::Replica => {
                    snapshot.insert(rel, EntryMeta::from_metadata(EntryKind::Symlink, &lmeta));
                }
                TreeSide::Source if !self.options.follow_symlinks => {
                    let error = SyncError::Unsupported {
                        path: abs.to_path_buf(),
                        details: "symlinks are not followed".to_string(),
                    };
                    snapshot.issues.push(WalkIssue::new(
                        side,
                        WalkIssueKind::SymlinkSkipped,
                        rel,
                        &error,
                    ));
                }
                TreeSide::Source => self.visit_followed(abs, rel, chain, snapshot),
            }
            return;
        }

        if file_type.is_dir() {
            snapshot.insert(rel, EntryMeta::from_metadata(EntryKind::Directory, &lmeta));
            self.descend(abs, rel, chain, snapshot);
        } else if file_type.is_file() {
            snapshot.insert(rel, EntryMeta::from_metadata(EntryKind::File, &lmeta));
        } else {
            self.record_special(abs, rel, &lmeta, snapshot);
        }
    }

    /// Source symlink with `follow_symlinks` enabled: copy what it points at.
    fn visit_followed(
        &self,
        abs: &Path,
        rel: &Path,
        chain: &mut Vec<PathBuf>,
        snapshot: &mut DirectorySnapshot,
    ) {
        let side = snapshot.side;
        let meta = match fs::metadata(abs) {
            Ok(m) => m,
            Err(err) => {
                let error = SyncError::from_io(abs, err);
                snapshot.issues.push(WalkIssue::new(
                    side,
                    WalkIssueKind::BrokenSymlink,
                    rel,
                    &error,
                ));
                return;
            }
        };

        if meta.is_dir() {
            let target = fs::canonicalize(abs).unwrap_or_else(|_| abs.to_path_buf());
            if chain.iter().any(|ancestor| ancestor == &target) {
                let error = SyncError::Unsupported {
                    path: abs.to_path_buf(),
                    details: format!("points at ancestor {}", target.display()),
                };
                snapshot.issues.push(WalkIssue::new(
                    side,
                    WalkIssueKind::SymlinkLoop,
                    rel,
                    &error,
                ));
                return;
            }
            snapshot.insert(rel, EntryMeta::from_metadata(EntryKind::Directory, &meta));
            self.descend(abs, rel, chain, snapshot);
        } else if meta.is_file() {
            snapshot.insert(rel, EntryMeta::from_metadata(EntryKind::File, &meta));
        } else {
            self.record_special(abs, rel, &meta, snapshot);
        }
    }

    fn descend(
        &self,
        abs: &Path,
        rel: &Path,
        chain: &mut Vec<PathBuf>,
        snapshot: &mut DirectorySnapshot,
    ) {
        if self.follow(snapshot.side) {
            let canonical = fs::canonicalize(abs).unwrap_or_else(|_| abs.to_path_buf());
            chain.push(canonical);
            self.walk_dir(abs, rel, chain, snapshot);
            chain.pop();
        } else {
            self.walk_dir(abs, rel, chain, snapshot);
        }
    }

    fn record_special(
        &self,
        abs: &Path,
        rel: &Path,
        meta: &fs::Metadata,
        snapshot: &mut DirectorySnapshot,
    ) {
        match snapshot.side {
            TreeSide::Replica => {
                snapshot.insert(rel, EntryMeta::from_metadata(EntryKind::Other, meta));
            }
            TreeSide::Source => {
                let error = SyncError::Unsupported {
                    path: abs.to_path_buf(),
                    details: "not a regular file or directory".to_string(),
                };
                snapshot.issues.push(WalkIssue::new(
                    TreeSide::Source,
                    WalkIssueKind::SpecialFile,
                    rel,
                    &error,
                ));
            }
        }
    }
}

fn metadata_for_path(path: &Path, follow_symlinks: bool) -> std::io::Result<fs::Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}
