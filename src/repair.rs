use crate::entry::Mtime;
use crate::reporter::Reporter;
use filetime::{FileTime, set_file_mtime};
use std::cmp::Reverse;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

/// Recorded metadata to write back to a live file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairAction {
    pub path: PathBuf,
    /// Path relative to the tree root, for messages.
    pub relative: String,
    pub mtime: Mtime,
    pub mode: u32,
}

/// Write recorded modification times and permission bits back to the live tree.
///
/// Actions are applied deepest path first, so a directory is only touched after
/// everything below it. The values written are the ones captured from the
/// manifest; nothing is re-read from the live tree. Content is never modified.
///
/// Returns the number of entries repaired.
pub fn apply_repairs(
    actions: &[RepairAction],
    reporter: &mut dyn Reporter,
) -> Result<usize, RepairError> {
    if actions.is_empty() {
        reporter.status("nothing to repair");
        return Ok(0);
    }

    let mut ordered: Vec<&RepairAction> = actions.iter().collect();
    ordered.sort_by_key(|action| Reverse(action.path.components().count()));

    for action in &ordered {
        set_mtime(&action.path, action.mtime)?;
        set_mode(&action.path, action.mode)?;
        reporter.status(&format!("repaired: {}", action.relative));
    }

    Ok(ordered.len())
}

fn set_mtime(path: &Path, mtime: Mtime) -> Result<(), RepairError> {
    let file_time = FileTime::from_unix_time(mtime.seconds(), mtime.subsec_nanos());
    set_file_mtime(path, file_time).map_err(|e| map_io(e, path))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), RepairError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| map_io(e, path))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> Result<(), RepairError> {
    let metadata = std::fs::metadata(path).map_err(|e| map_io(e, path))?;
    let mut permissions = metadata.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    std::fs::set_permissions(path, permissions).map_err(|e| map_io(e, path))
}

fn map_io(e: std::io::Error, path: &Path) -> RepairError {
    if e.kind() == ErrorKind::PermissionDenied {
        RepairError::PermissionDenied(path.to_path_buf())
    } else {
        RepairError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}
