use super::*;
use crate::manifest::{self, ManifestLocation};

fn build_at(location: &ManifestLocation) -> Snapshot {
    build_snapshot(
        &location.tree_root,
        "test",
        location.excluded_name(),
        &mut RecordingReporter::default(),
    )
    .unwrap()
    .snapshot
}

fn verify_at(snapshot: &Snapshot, location: &ManifestLocation) -> (bool, RecordingReporter) {
    let mut reporter = RecordingReporter::default();
    let ok = verify_tree(
        snapshot,
        &location.tree_root,
        VerifyOptions::default(),
        location.excluded_name(),
        &mut reporter,
    )
    .unwrap();
    (ok, reporter)
}

#[test]
fn test_in_tree_manifest_is_not_an_extra_file() {
    let temp = TempDir::new().unwrap();
    sample_tree(temp.path());
    let location = ManifestLocation::in_tree(temp.path());

    let snapshot = build_at(&location);
    manifest::save(&snapshot, &location.manifest_path).unwrap();
    let loaded = manifest::load(&location.manifest_path).unwrap();

    let (ok, reporter) = verify_at(&loaded, &location);

    assert!(ok);
    assert!(reporter.errors.is_empty(), "{:?}", reporter.errors);
}

#[test]
fn test_manifest_name_is_only_excluded_at_the_top() {
    let temp = TempDir::new().unwrap();
    sample_tree(temp.path());
    let location = ManifestLocation::in_tree(temp.path());

    let snapshot = build_at(&location);
    let sub = temp.path().join("sub");
    let sub_mtime = live_mtime(&sub);
    fs::write(sub.join("filekeep.toml"), "stray").unwrap();
    set_mtime(&sub, sub_mtime.seconds(), sub_mtime.subsec_nanos());

    let (ok, reporter) = verify_at(&snapshot, &location);

    assert!(!ok);
    assert_eq!(reporter.errors, vec!["extra file: sub/filekeep.toml"]);
}

#[test]
fn test_named_target_keeps_manifest_outside() {
    let temp = TempDir::new().unwrap();
    let tree = temp.path().join("photos");
    fs::create_dir(&tree).unwrap();
    sample_tree(&tree);
    let location = ManifestLocation::named_in(temp.path(), "photos").unwrap();

    let snapshot = build_at(&location);
    manifest::save(&snapshot, &location.manifest_path).unwrap();
    assert!(temp.path().join("photos.filekeep.toml").is_file());

    let (ok, reporter) = verify_at(&snapshot, &location);
    assert!(ok);
    assert!(reporter.errors.is_empty());
}

#[test]
fn test_named_target_reports_stray_manifest_inside() {
    let temp = TempDir::new().unwrap();
    let tree = temp.path().join("photos");
    fs::create_dir(&tree).unwrap();
    sample_tree(&tree);
    let location = ManifestLocation::named_in(temp.path(), "photos").unwrap();

    let snapshot = build_at(&location);
    fs::write(tree.join("filekeep.toml"), "stray").unwrap();

    let (ok, reporter) = verify_at(&snapshot, &location);

    assert!(!ok);
    assert_eq!(reporter.errors, vec!["extra file: filekeep.toml"]);
}
