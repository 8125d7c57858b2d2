//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. the replica does not exist yet), the path is made absolute
/// relative to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Whether one tree contains the other (or they are the same tree).
///
/// Mirroring a tree into its own subtree recurses forever, and a source nested
/// inside the replica would be deleted as an orphan.
pub fn trees_overlap(a: &Path, b: &Path) -> bool {
    let a = resolve_absolute_path(a);
    let b = resolve_absolute_path(b);
    a.starts_with(&b) || b.starts_with(&a)
}

/// Render a relative path with `/` separators for log output.
pub fn display_relative(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
