//! Non-recursive directory listing.
//!
//! Lists the immediate children of a directory together with the metadata a
//! snapshot records for them. Metadata is read without following symbolic links,
//! and entries come back in the order the operating system lists them.

use crate::entry::{Mtime, mode_of};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug, thiserror::Error)]
pub enum DirListError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File name is not valid UTF-8: {0}")]
    InvalidName(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub name: String,
    pub kind: FsEntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEntryKind {
    File { size: u64, mtime: Mtime, mode: u32 },
    Dir { mtime: Mtime, mode: u32 },
    /// Symlinks, FIFOs, sockets and devices. Not tracked.
    Other,
}

/// Timestamp and permission bits of a directory, read without following symlinks.
pub fn stat_directory(path: &Path) -> Result<(Mtime, u32), DirListError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|e| map_io(e, path))?;
    if !metadata.is_dir() {
        return Err(DirListError::Io(std::io::Error::other(format!(
            "Not a directory: {}",
            path.display()
        ))));
    }
    Ok((modified(&metadata)?, mode_of(&metadata)))
}

pub fn list_directory(dir: &Path) -> Result<Vec<FsEntry>, DirListError> {
    trace!("Listing {}", dir.display());
    let read_dir = std::fs::read_dir(dir).map_err(|e| map_io(e, dir))?;

    let mut entries = Vec::new();

    for entry in read_dir {
        let entry = entry.map_err(DirListError::Io)?;
        let path = entry.path();

        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| DirListError::InvalidName(path.clone()))?;

        let metadata = std::fs::symlink_metadata(&path).map_err(|e| map_io(e, &path))?;
        let file_type = metadata.file_type();

        let kind = if file_type.is_dir() {
            FsEntryKind::Dir {
                mtime: modified(&metadata)?,
                mode: mode_of(&metadata),
            }
        } else if file_type.is_file() {
            FsEntryKind::File {
                size: metadata.len(),
                mtime: modified(&metadata)?,
                mode: mode_of(&metadata),
            }
        } else {
            FsEntryKind::Other
        };

        entries.push(FsEntry { name, kind });
    }

    Ok(entries)
}

fn modified(metadata: &Metadata) -> Result<Mtime, DirListError> {
    let mtime = metadata.modified().map_err(DirListError::Io)?;
    Ok(Mtime::from_system_time(mtime))
}

fn map_io(e: std::io::Error, path: &Path) -> DirListError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        DirListError::PermissionDenied(path.to_path_buf())
    } else {
        DirListError::Io(e)
    }
}
