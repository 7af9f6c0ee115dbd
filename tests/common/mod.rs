use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::path::Path;

/// `filekeep` running inside `cwd` with a clean logging environment.
pub fn filekeep_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("filekeep");
    cmd.current_dir(cwd).env_remove("RUST_LOG");
    cmd
}

/// `a.txt` and `sub/b.txt`, both containing `hi`.
pub fn sample_tree(root: &Path) {
    std::fs::write(root.join("a.txt"), "hi").unwrap();
    std::fs::create_dir(root.join("sub")).unwrap();
    std::fs::write(root.join("sub/b.txt"), "hi").unwrap();
}

// Each integration test file is compiled as its own crate, and not all of them
// create a collection first.
#[allow(dead_code)]
pub fn create_collection(cwd: &Path) {
    filekeep_cmd(cwd).arg("create").assert().success();
}
