//! In-memory snapshot model.
//!
//! A snapshot is a tree of [`Entry`] values rooted at an unnamed
//! [`DirectoryEntry`]. Directories own their children in listing order, keyed by
//! name, so lookups during verification are cheap while serialization and
//! export preserve the order the tree was captured in.

use hashlink::LinkedHashMap;
use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Permission bits recorded for files in manifests that predate the mode field.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Permission bits recorded for directories in manifests that predate the mode field.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Modification time in nanoseconds since the Unix epoch.
///
/// Signed so that pre-epoch timestamps survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Mtime(i64);

impl Mtime {
    pub const fn from_nanos(nanos: i64) -> Self {
        Mtime(nanos)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
            Err(before) => -i64::try_from(before.duration().as_nanos()).unwrap_or(i64::MAX),
        };
        Mtime(nanos)
    }

    /// Whole seconds, rounded towards negative infinity.
    pub fn seconds(self) -> i64 {
        self.0.div_euclid(NANOS_PER_SECOND)
    }

    /// Sub-second part, always in `0..1_000_000_000`.
    pub fn subsec_nanos(self) -> u32 {
        // rem_euclid of a positive divisor is non-negative and below the divisor.
        self.0.rem_euclid(NANOS_PER_SECOND) as u32
    }

    pub fn truncated_to_seconds(self) -> Self {
        Mtime(self.seconds() * NANOS_PER_SECOND)
    }
}

/// How recorded and live modification times are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MtimeComparison {
    /// Nanosecond equality.
    #[default]
    Exact,
    /// Equality after truncating both sides to whole seconds. Useful after
    /// copying through tools or filesystems that drop sub-second precision.
    Flexible,
    /// Modification times are not compared at all.
    Ignore,
}

impl MtimeComparison {
    pub fn matches(self, recorded: Mtime, live: Mtime) -> bool {
        match self {
            MtimeComparison::Exact => recorded == live,
            MtimeComparison::Flexible => {
                recorded.truncated_to_seconds() == live.truncated_to_seconds()
            }
            MtimeComparison::Ignore => true,
        }
    }
}

/// Permission bits of a filesystem object.
#[cfg(unix)]
pub fn mode_of(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Permission bits of a filesystem object.
///
/// Only the read-only flag is available here, so the bits are synthesized.
#[cfg(not(unix))]
pub fn mode_of(metadata: &Metadata) -> u32 {
    let base = if metadata.is_dir() {
        DEFAULT_DIR_MODE
    } else {
        DEFAULT_FILE_MODE
    };
    if metadata.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub mtime: Mtime,
    pub mode: u32,
    /// Lowercase hex SHA-1 of the content. Empty until computed.
    pub sha1: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// `None` only for the root of a snapshot.
    pub name: Option<String>,
    pub mtime: Mtime,
    pub mode: u32,
    pub children: LinkedHashMap<String, Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(FileEntry),
    Dir(DirectoryEntry),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(file) => &file.name,
            Entry::Dir(dir) => dir.name.as_deref().unwrap_or(""),
        }
    }

    pub fn mtime(&self) -> Mtime {
        match self {
            Entry::File(file) => file.mtime,
            Entry::Dir(dir) => dir.mtime,
        }
    }

    pub fn mode(&self) -> u32 {
        match self {
            Entry::File(file) => file.mode,
            Entry::Dir(dir) => dir.mode,
        }
    }

    /// Bytes of file content in this entry, recursively for directories.
    pub fn total_size(&self) -> u64 {
        match self {
            Entry::File(file) => file.size,
            Entry::Dir(dir) => dir.total_size(),
        }
    }
}

impl DirectoryEntry {
    pub fn root(mtime: Mtime, mode: u32) -> Self {
        DirectoryEntry {
            name: None,
            mtime,
            mode,
            children: LinkedHashMap::new(),
        }
    }

    pub fn named(name: impl Into<String>, mtime: Mtime, mode: u32) -> Self {
        DirectoryEntry {
            name: Some(name.into()),
            mtime,
            mode,
            children: LinkedHashMap::new(),
        }
    }

    /// Inserts a child, keeping the position of an existing same-named child.
    pub fn insert(&mut self, entry: Entry) {
        let name = entry.name().to_string();
        self.children.replace(name, entry);
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.children.get(name)
    }

    pub fn total_size(&self) -> u64 {
        self.children.values().map(Entry::total_size).sum()
    }

    /// Number of directories (this one included) and files in the tree.
    pub fn counts(&self) -> (usize, usize) {
        let mut directories = 1;
        let mut files = 0;
        for child in self.children.values() {
            match child {
                Entry::File(_) => files += 1,
                Entry::Dir(dir) => {
                    let (d, f) = dir.counts();
                    directories += d;
                    files += f;
                }
            }
        }
        (directories, files)
    }

    /// Depth-first list of every file with its `/`-separated path relative to
    /// this directory, in child order.
    pub fn files(&self) -> Vec<(String, &FileEntry)> {
        let mut out = Vec::new();
        collect_files(self, "", &mut out);
        out
    }
}

fn collect_files<'a>(
    dir: &'a DirectoryEntry,
    prefix: &str,
    out: &mut Vec<(String, &'a FileEntry)>,
) {
    for child in dir.children.values() {
        let path = if prefix.is_empty() {
            child.name().to_string()
        } else {
            format!("{}/{}", prefix, child.name())
        };
        match child {
            Entry::File(file) => out.push((path, file)),
            Entry::Dir(sub) => collect_files(sub, &path, out),
        }
    }
}

/// A named, persisted picture of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub root: DirectoryEntry,
}

impl Snapshot {
    pub const DEFAULT_NAME: &'static str = "Filekeep Collection";

    pub fn new(name: impl Into<String>, root: DirectoryEntry) -> Self {
        Snapshot {
            name: name.into(),
            root,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.root.total_size()
    }

    pub fn counts(&self) -> (usize, usize) {
        self.root.counts()
    }

    pub fn files(&self) -> Vec<(String, &FileEntry)> {
        self.root.files()
    }
}

#[cfg(test)]
pub(crate) fn file(name: &str, size: u64, mtime_nanos: i64, sha1: &str) -> Entry {
    Entry::File(FileEntry {
        name: name.to_string(),
        size,
        mtime: Mtime::from_nanos(mtime_nanos),
        mode: DEFAULT_FILE_MODE,
        sha1: sha1.to_string(),
    })
}
