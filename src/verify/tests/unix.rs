use super::*;
use std::os::unix::fs::PermissionsExt;

fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[test]
fn test_mode_mismatch_fails_without_touch() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("f"), "x").unwrap();
    fs::set_permissions(root.join("f"), fs::Permissions::from_mode(0o644)).unwrap();

    let snapshot = snapshot_of(root);
    fs::set_permissions(root.join("f"), fs::Permissions::from_mode(0o600)).unwrap();

    let (ok, reporter) = verify(&snapshot, root);

    assert!(!ok);
    assert_eq!(
        reporter.errors,
        vec!["mode differs: f (recorded 0644, found 0600)"]
    );
}

#[test]
fn test_touch_restores_recorded_mode() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("f"), "x").unwrap();
    fs::set_permissions(root.join("f"), fs::Permissions::from_mode(0o640)).unwrap();

    let snapshot = snapshot_of(root);
    fs::set_permissions(root.join("f"), fs::Permissions::from_mode(0o600)).unwrap();

    let (ok, reporter) = verify_with(&snapshot, root, touch_options());

    assert!(ok);
    assert_eq!(reporter.statuses, vec!["repaired: f"]);
    let mode = fs::metadata(root.join("f")).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o640);
}

#[test]
fn test_symlinks_are_ignored() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    sample_tree(root);

    let snapshot = snapshot_of(root);
    std::os::unix::fs::symlink("a.txt", root.join("link")).unwrap();

    let (ok, reporter) = verify(&snapshot, root);

    assert!(ok);
    assert!(reporter.errors.is_empty());
}

#[test]
fn test_unreadable_file_aborts_verification() {
    if running_as_root() {
        return;
    }

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("secret"), "x").unwrap();
    fs::set_permissions(root.join("secret"), fs::Permissions::from_mode(0o000)).unwrap();

    let snapshot = snapshot_of_unreadable(root);

    let result = verify_tree(
        &snapshot,
        root,
        VerifyOptions::default(),
        None,
        &mut RecordingReporter::default(),
    );

    fs::set_permissions(root.join("secret"), fs::Permissions::from_mode(0o644)).unwrap();

    assert!(matches!(
        result,
        Err(VerifyError::Checksum(ChecksumError::PermissionDenied(_)))
    ));
}

/// The builder cannot hash an unreadable file, so record it by hand.
fn snapshot_of_unreadable(root: &Path) -> Snapshot {
    let (mtime, mode) = stat_directory(root).unwrap();
    let meta = fs::symlink_metadata(root.join("secret")).unwrap();
    let mut tree = DirectoryEntry::root(mtime, mode);
    tree.insert(Entry::File(FileEntry {
        name: "secret".to_string(),
        size: meta.len(),
        mtime: Mtime::from_system_time(meta.modified().unwrap()),
        mode: crate::entry::mode_of(&meta),
        sha1: String::new(),
    }));
    Snapshot::new("test", tree)
}
