use crate::checksum::{ChecksumError, checksum_file};
use crate::dir_list::{DirListError, FsEntryKind, list_directory, stat_directory};
use crate::entry::{DirectoryEntry, Entry, FileEntry, Snapshot};
use crate::reporter::Reporter;
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
}

#[derive(Debug)]
pub struct BuildResult {
    pub snapshot: Snapshot,
    /// Directories visited, the root included.
    pub directories: usize,
    pub files: usize,
}

/// Capture the current state of the tree below `root`.
///
/// Every regular file is checksummed. Directories and files are recorded in the
/// order the filesystem lists them, which is not guaranteed to be stable across
/// runs. Symbolic links and special files are skipped.
///
/// `excluded` names a file directly inside `root` that is left out of the
/// snapshot; this is how a manifest stored inside the tree keeps out of it.
pub fn build_snapshot(
    root: &Path,
    name: &str,
    excluded: Option<&OsStr>,
    reporter: &mut dyn Reporter,
) -> Result<BuildResult, SnapshotError> {
    let (mtime, mode) = stat_directory(root)?;
    let mut tree = DirectoryEntry::root(mtime, mode);

    let mut counts = Counts {
        directories: 1,
        files: 0,
    };

    reporter.initialize(0);
    walk_and_record(root, &mut tree, excluded, &mut counts, reporter)?;

    Ok(BuildResult {
        snapshot: Snapshot::new(name, tree),
        directories: counts.directories,
        files: counts.files,
    })
}

struct Counts {
    directories: usize,
    files: usize,
}

fn walk_and_record(
    current_dir: &Path,
    node: &mut DirectoryEntry,
    excluded: Option<&OsStr>,
    counts: &mut Counts,
    reporter: &mut dyn Reporter,
) -> Result<(), SnapshotError> {
    for fs_entry in list_directory(current_dir)? {
        if excluded == Some(OsStr::new(&fs_entry.name)) {
            continue;
        }

        let entry_path = current_dir.join(&fs_entry.name);

        match fs_entry.kind {
            FsEntryKind::File { mtime, mode, .. } => {
                let checksum = checksum_file(&entry_path, &mut |n| reporter.advance(n))?;
                counts.files += 1;
                node.insert(Entry::File(FileEntry {
                    name: fs_entry.name,
                    size: checksum.size,
                    mtime,
                    mode,
                    sha1: checksum.sha1,
                }));
            }
            FsEntryKind::Dir { mtime, mode } => {
                counts.directories += 1;
                let mut sub = DirectoryEntry::named(fs_entry.name, mtime, mode);
                // The manifest only ever sits at the top of the tree.
                walk_and_record(&entry_path, &mut sub, None, counts, reporter)?;
                node.insert(Entry::Dir(sub));
            }
            FsEntryKind::Other => {
                debug!(
                    "Skipping {}: not a regular file or directory",
                    entry_path.display()
                );
            }
        }
    }

    Ok(())
}
