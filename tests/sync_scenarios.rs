//! Library-level mirroring scenarios: single-change ticks, idempotence,
//! deletion ordering, failure isolation, and property tests over random trees.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use proptest::prelude::*;

use folder_syncer::logger::dual::{ActivityLogger, ActivityLoggerOptions};
use folder_syncer::logger::file::{LogFileConfig, LogFileWriter};
use folder_syncer::sync::apply::Outcome;
use folder_syncer::sync::checksum::CompareMode;
use folder_syncer::sync::engine::{Syncer, SyncerConfig, TickReport};
use folder_syncer::sync::plan::{OperationKind, SyncOperation};

struct Harness {
    _dir: tempfile::TempDir,
    source: PathBuf,
    replica: PathBuf,
    log: PathBuf,
    syncer: Syncer,
}

impl Harness {
    fn new() -> Self {
        Self::with_compare(CompareMode::Checksum)
    }

    fn with_compare(compare: CompareMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let replica = dir.path().join("replica");
        fs::create_dir_all(&source).unwrap();
        let mut config = SyncerConfig::new(&source, &replica);
        config.compare = compare;
        Self {
            log: dir.path().join("sync.log"),
            syncer: Syncer::new(config),
            source,
            replica,
            _dir: dir,
        }
    }

    /// Run one tick with a file-only logger and return the report plus the
    /// lines that tick appended to the log file.
    fn tick(&self) -> (TickReport, Vec<String>) {
        let before = fs::read_to_string(&self.log).unwrap_or_default().lines().count();
        let writer = LogFileWriter::open_strict(LogFileConfig::new(&self.log)).unwrap();
        let mut logger = ActivityLogger::new(
            writer,
            ActivityLoggerOptions {
                console: false,
                ..ActivityLoggerOptions::default()
            },
        );
        let report = self.syncer.run_tick(&mut logger, None);
        logger.shutdown();
        drop(logger);

        let lines = fs::read_to_string(&self.log)
            .unwrap()
            .lines()
            .skip(before)
            .map(str::to_string)
            .collect();
        (report, lines)
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.source.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

fn operation_lines<'a>(lines: &'a [String], verb: &str) -> Vec<&'a String> {
    lines
        .iter()
        .filter(|l| l.contains(&format!(" {verb} ")))
        .collect()
}

/// Relative path → `None` for directories, `Some(bytes)` for files.
fn tree(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    fn visit(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Option<Vec<u8>>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let rel = path.strip_prefix(root).unwrap().to_path_buf();
            if path.is_dir() {
                out.insert(rel, None);
                visit(root, &path, out);
            } else {
                out.insert(rel, Some(fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = BTreeMap::new();
    if root.exists() {
        visit(root, root, &mut out);
    }
    out
}

// ──────────────────── single-change scenarios ────────────────────

#[test]
fn new_file_is_created_with_one_event() {
    let h = Harness::new();
    h.write("a.txt", "hi");

    let (report, lines) = h.tick();

    assert_eq!(report.operations(), 1);
    assert_eq!(fs::read_to_string(h.replica.join("a.txt")).unwrap(), "hi");
    let creates = operation_lines(&lines, "CREATE");
    assert_eq!(creates.len(), 1, "lines: {lines:?}");
    assert!(creates[0].ends_with("CREATE file a.txt OK"));
}

#[test]
fn changed_file_is_updated_with_one_event() {
    let h = Harness::new();
    h.write("a.txt", "hi");
    h.tick();

    h.write("a.txt", "bye");
    let (report, lines) = h.tick();

    assert_eq!(report.operations(), 1);
    assert_eq!(report.events[0].operation, OperationKind::Update);
    assert_eq!(fs::read_to_string(h.replica.join("a.txt")).unwrap(), "bye");
    assert_eq!(operation_lines(&lines, "UPDATE").len(), 1, "lines: {lines:?}");
}

#[test]
fn same_size_change_is_detected_by_checksum() {
    let h = Harness::new();
    h.write("a.txt", "abc");
    h.tick();

    // Same size, and the mtime may well land in the same second.
    h.write("a.txt", "xyz");
    let (report, _) = h.tick();
    assert_eq!(report.operations(), 1);
    assert_eq!(fs::read_to_string(h.replica.join("a.txt")).unwrap(), "xyz");
}

#[test]
fn removed_file_is_deleted_with_one_event() {
    let h = Harness::new();
    h.write("a.txt", "a");
    h.write("b.txt", "b");
    h.tick();

    fs::remove_file(h.source.join("b.txt")).unwrap();
    let (report, lines) = h.tick();

    assert_eq!(report.operations(), 1);
    assert!(!h.replica.join("b.txt").exists());
    assert!(h.replica.join("a.txt").exists());
    let deletes = operation_lines(&lines, "DELETE");
    assert_eq!(deletes.len(), 1, "lines: {lines:?}");
    assert!(deletes[0].ends_with("DELETE file b.txt OK"));
}

#[test]
fn replica_only_entries_are_removed_on_first_tick() {
    let h = Harness::new();
    h.write("keep.txt", "k");
    fs::create_dir_all(h.replica.join("stray/deeper")).unwrap();
    fs::write(h.replica.join("stray/deeper/x.bin"), "x").unwrap();
    fs::write(h.replica.join("orphan.txt"), "o").unwrap();

    h.tick();
    assert_eq!(tree(&h.source), tree(&h.replica));
}

// ──────────────────── ordering ────────────────────

#[test]
fn deleted_directory_goes_with_its_contents() {
    let h = Harness::new();
    h.write("d/f.txt", "f");
    h.write("d/sub/g.txt", "g");
    h.tick();

    fs::remove_dir_all(h.source.join("d")).unwrap();
    let (report, _) = h.tick();

    assert_eq!(report.failures(), 0);
    assert!(!h.replica.join("d").exists());
    // One recursive delete covers the whole subtree.
    assert_eq!(report.operations(), 1);
    assert_eq!(report.events[0].path, PathBuf::from("d"));
}

#[test]
fn plan_orders_deletes_deep_first_and_creates_shallow_first() {
    let h = Harness::new();
    h.write("keep/old/inner.txt", "i");
    h.write("keep/old.txt", "o");
    h.tick();

    fs::remove_file(h.source.join("keep/old/inner.txt")).unwrap();
    fs::remove_file(h.source.join("keep/old.txt")).unwrap();
    h.write("n1/n2/n3.txt", "new");

    let plan = h.syncer.plan();
    let delete_depths: Vec<usize> = plan.deletions.iter().map(SyncOperation::depth).collect();
    let upsert_depths: Vec<usize> = plan.upserts.iter().map(SyncOperation::depth).collect();

    assert!(delete_depths.windows(2).all(|w| w[0] >= w[1]), "{delete_depths:?}");
    assert!(upsert_depths.windows(2).all(|w| w[0] <= w[1]), "{upsert_depths:?}");
}

// ──────────────────── failure isolation ────────────────────

#[test]
fn vanished_source_file_fails_alone() {
    let h = Harness::new();
    h.write("a.txt", "a");
    h.write("b.txt", "b");
    h.write("c.txt", "c");
    fs::create_dir_all(&h.replica).unwrap();

    let plan = h.syncer.plan();
    fs::remove_file(h.source.join("a.txt")).unwrap();
    let report = h.syncer.applier().apply(&plan, &mut ActivityLogger::null(), None);

    assert_eq!(report.events.len(), 3);
    for event in &report.events {
        match (&event.path.to_string_lossy()[..], &event.outcome) {
            ("a.txt", Outcome::Failed { code, .. }) => assert_eq!(code, "FSY-3003"),
            ("b.txt" | "c.txt", Outcome::Ok) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(fs::read_to_string(h.replica.join("b.txt")).unwrap(), "b");
    assert_eq!(fs::read_to_string(h.replica.join("c.txt")).unwrap(), "c");
}

#[cfg(unix)]
#[test]
fn permission_failure_does_not_block_siblings() {
    use std::os::unix::fs::PermissionsExt;

    if nix::unistd::geteuid().is_root() {
        return;
    }
    let h = Harness::new();
    h.write("locked/a.txt", "a");
    h.write("b.txt", "b");
    h.write("c.txt", "c");
    h.tick();

    // Replica directory becomes read-only: the update inside it must fail.
    h.write("locked/a.txt", "changed");
    h.write("b.txt", "bb");
    h.write("c.txt", "cc");
    fs::set_permissions(h.replica.join("locked"), fs::Permissions::from_mode(0o555)).unwrap();
    let (report, lines) = h.tick();
    fs::set_permissions(h.replica.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(report.operations(), 3);
    assert_eq!(report.failures(), 1);
    assert!(lines.iter().any(|l| l.contains("UPDATE file locked/a.txt FAILED [FSY-3001]")));
    assert_eq!(fs::read_to_string(h.replica.join("b.txt")).unwrap(), "bb");
    assert_eq!(fs::read_to_string(h.replica.join("c.txt")).unwrap(), "cc");

    // Next tick retries naturally and succeeds.
    let (report, _) = h.tick();
    assert_eq!(report.failures(), 0);
    assert_eq!(
        fs::read_to_string(h.replica.join("locked/a.txt")).unwrap(),
        "changed"
    );
}

// ──────────────────── symlinks ────────────────────

#[cfg(unix)]
#[test]
fn source_symlinks_are_skipped_with_a_warning() {
    let h = Harness::new();
    h.write("real.txt", "r");
    std::os::unix::fs::symlink(h.source.join("real.txt"), h.source.join("link.txt")).unwrap();

    let (report, lines) = h.tick();

    assert_eq!(report.walk_issues.len(), 1);
    assert!(!h.replica.join("link.txt").exists());
    assert!(lines.iter().any(|l| l.contains("WARN  WALK link.txt symlink skipped")));

    // Still skipped on the next tick, but the warning is not repeated.
    let (report, lines) = h.tick();
    assert_eq!(report.operations(), 0);
    assert_eq!(report.walk_issues.len(), 1);
    assert!(lines.is_empty(), "lines: {lines:?}");
}

#[cfg(unix)]
#[test]
fn cleared_walk_issue_is_reported_again_when_it_returns() {
    let h = Harness::new();
    h.write("real.txt", "r");
    let link = h.source.join("link.txt");
    std::os::unix::fs::symlink(h.source.join("real.txt"), &link).unwrap();
    h.tick();

    fs::remove_file(&link).unwrap();
    let (report, lines) = h.tick();
    assert!(report.walk_issues.is_empty());
    assert!(lines.is_empty(), "lines: {lines:?}");

    std::os::unix::fs::symlink(h.source.join("real.txt"), &link).unwrap();
    let (_, lines) = h.tick();
    assert_eq!(lines.len(), 1, "lines: {lines:?}");
    assert!(lines[0].contains("WALK link.txt symlink skipped"));
}

#[cfg(unix)]
#[test]
fn followed_symlinks_are_copied_as_content() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    let outside = dir.path().join("outside");
    let replica = dir.path().join("replica");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("shared.txt"), "shared").unwrap();
    std::os::unix::fs::symlink(&outside, source.join("linked")).unwrap();
    std::os::unix::fs::symlink(&source, source.join("loop")).unwrap();

    let mut config = SyncerConfig::new(&source, &replica);
    config.follow_symlinks = true;
    let report = Syncer::new(config).run_tick(&mut ActivityLogger::null(), None);

    assert_eq!(report.failures(), 0);
    assert!(replica.join("linked").is_dir());
    assert!(!fs::symlink_metadata(replica.join("linked")).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_to_string(replica.join("linked/shared.txt")).unwrap(), "shared");
    assert!(!replica.join("loop").exists());
    assert_eq!(report.walk_issues.len(), 1);
}

// ──────────────────── idempotence and mirror invariant ────────────────────

#[test]
fn second_tick_writes_nothing_to_the_log() {
    let h = Harness::new();
    h.write("a.txt", "a");
    h.write("d/e/f.txt", "f");
    fs::create_dir_all(h.source.join("empty")).unwrap();
    h.tick();

    let (report, lines) = h.tick();
    assert_eq!(report.operations(), 0);
    assert!(lines.is_empty(), "lines: {lines:?}");
}

#[test]
fn source_files_named_like_copy_temporaries_are_mirrored() {
    let h = Harness::new();
    h.write("a.txt", "real");
    h.write(".a.txt.fsyncer-tmp", "lookalike");
    h.write(".fsyncer-a.tmp", "another");

    let (first, _) = h.tick();
    assert_eq!(first.failures(), 0);
    assert_eq!(first.operations(), 3);
    assert_eq!(tree(&h.source), tree(&h.replica));

    let (second, lines) = h.tick();
    assert_eq!(second.operations(), 0);
    assert!(lines.is_empty(), "lines: {lines:?}");
}

#[test]
fn metadata_mode_second_tick_is_silent() {
    let h = Harness::with_compare(CompareMode::Metadata);
    h.write("a.txt", "a");
    h.tick();
    let (report, lines) = h.tick();
    assert_eq!(report.operations(), 0);
    assert!(lines.is_empty(), "lines: {lines:?}");
}

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

/// Up to three levels of short names; a path that is a file in one sample
/// and a parent in another is resolved in favour of the first one written.
fn tree_strategy() -> impl Strategy<Value = Vec<(Vec<String>, Node)>> {
    let name = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(str::to_string);
    let path = prop::collection::vec(name, 1..=3);
    let node = prop_oneof![
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Node::File),
        Just(Node::Dir),
    ];
    prop::collection::vec((path, node), 0..12)
}

fn materialize(root: &Path, nodes: &[(Vec<String>, Node)]) {
    fs::create_dir_all(root).unwrap();
    'outer: for (parts, node) in nodes {
        let mut path = root.to_path_buf();
        for (i, part) in parts.iter().enumerate() {
            path.push(part);
            let last = i == parts.len() - 1;
            if path.is_file() {
                continue 'outer;
            }
            if !last && !path.exists() {
                fs::create_dir(&path).unwrap();
            }
        }
        if path.exists() {
            continue;
        }
        match node {
            Node::File(bytes) => fs::write(&path, bytes).unwrap(),
            Node::Dir => fs::create_dir(&path).unwrap(),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tick_makes_replica_a_mirror(
        source_tree in tree_strategy(),
        replica_tree in tree_strategy(),
    ) {
        let h = Harness::new();
        materialize(&h.source, &source_tree);
        materialize(&h.replica, &replica_tree);

        let (first, _) = h.tick();
        prop_assert_eq!(first.failures(), 0);
        prop_assert_eq!(tree(&h.source), tree(&h.replica));

        let (second, lines) = h.tick();
        prop_assert_eq!(second.operations(), 0);
        prop_assert!(lines.is_empty(), "second tick logged {:?}", lines);
    }
}
