use super::*;
use crate::reporter::RecordingReporter;
use crate::snapshot::build_snapshot;
use filetime::{FileTime, set_file_mtime};
use std::fs;
use tempfile::TempDir;

fn snapshot_of(root: &Path) -> Snapshot {
    build_snapshot(root, "test", None, &mut RecordingReporter::default())
        .unwrap()
        .snapshot
}

fn verify_with(
    snapshot: &Snapshot,
    root: &Path,
    options: VerifyOptions,
) -> (bool, RecordingReporter) {
    let mut reporter = RecordingReporter::default();
    let ok = verify_tree(snapshot, root, options, None, &mut reporter).unwrap();
    (ok, reporter)
}

fn verify(snapshot: &Snapshot, root: &Path) -> (bool, RecordingReporter) {
    verify_with(snapshot, root, VerifyOptions::default())
}

fn touch_options() -> VerifyOptions {
    VerifyOptions {
        touch: true,
        ..VerifyOptions::default()
    }
}

fn live_mtime(path: &Path) -> Mtime {
    Mtime::from_system_time(fs::symlink_metadata(path).unwrap().modified().unwrap())
}

fn set_mtime(path: &Path, seconds: i64, nanos: u32) {
    set_file_mtime(path, FileTime::from_unix_time(seconds, nanos)).unwrap();
}

/// `a.txt` and `sub/b.txt`, both containing `hi`.
fn sample_tree(root: &Path) {
    fs::write(root.join("a.txt"), "hi").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/b.txt"), "hi").unwrap();
}

mod manifest_location;
#[cfg(unix)]
#[path = "unix.rs"]
mod unix_tests;
