//! Persisted snapshot documents.
//!
//! A manifest is a TOML document holding a [`Snapshot`]: a `[metadata]` table
//! carrying the format version and a `[collection]` table carrying the display
//! name and the mirrored directory tree. Children are arrays of tables, so the
//! order the tree was captured in survives a round trip.

use crate::entry::{
    DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DirectoryEntry, Entry, FileEntry, Mtime, Snapshot,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Manifest file name when the tracked tree is the current directory.
pub const MANIFEST_FILENAME: &str = "filekeep.toml";

/// Suffix of the sibling manifest of a named subdirectory.
pub const SIBLING_MANIFEST_SUFFIX: &str = ".filekeep.toml";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(u32),
    #[error("Duplicate entry name in manifest: {0}")]
    DuplicateName(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Metadata {
    version: u32,
}

/// Only the metadata section, ignoring everything else, so the version can be
/// checked before the rest of the document is interpreted.
#[derive(Debug, Deserialize)]
struct MetadataOnly {
    metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDocument {
    metadata: Metadata,
    collection: CollectionNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CollectionNode {
    name: String,
    root: RootNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RootNode {
    #[serde(default)]
    mtime_nanos: i64,
    #[serde(default = "default_dir_mode")]
    mode: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    entries: Vec<ManifestNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
enum ManifestNode {
    #[serde(rename = "file")]
    File {
        name: String,
        #[serde(default)]
        mtime_nanos: i64,
        #[serde(default = "default_file_mode")]
        mode: u32,
        size: u64,
        sha1: String,
    },
    #[serde(rename = "dir")]
    Dir {
        name: String,
        #[serde(default)]
        mtime_nanos: i64,
        #[serde(default = "default_dir_mode")]
        mode: u32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        entries: Vec<ManifestNode>,
    },
}

fn default_file_mode() -> u32 {
    DEFAULT_FILE_MODE
}

fn default_dir_mode() -> u32 {
    DEFAULT_DIR_MODE
}

const SUPPORTED_VERSION: u32 = 1;

/// Parse a TOML manifest into a snapshot.
pub fn from_toml(content: &str) -> Result<Snapshot, ManifestError> {
    // Check the version first so that a document from a future version is
    // reported as such instead of as an unexplained parse failure.
    let metadata_only: MetadataOnly = toml::from_str(content)?;

    if metadata_only.metadata.version != SUPPORTED_VERSION {
        return Err(ManifestError::UnsupportedVersion(
            metadata_only.metadata.version,
        ));
    }

    let document: ManifestDocument = toml::from_str(content)?;
    let root = &document.collection.root;
    let mut dir = DirectoryEntry::root(Mtime::from_nanos(root.mtime_nanos), root.mode);
    fill_children(&mut dir, &root.entries)?;

    Ok(Snapshot::new(document.collection.name, dir))
}

fn fill_children(dir: &mut DirectoryEntry, nodes: &[ManifestNode]) -> Result<(), ManifestError> {
    for node in nodes {
        let entry = match node {
            ManifestNode::File {
                name,
                mtime_nanos,
                mode,
                size,
                sha1,
            } => Entry::File(FileEntry {
                name: name.clone(),
                size: *size,
                mtime: Mtime::from_nanos(*mtime_nanos),
                mode: *mode,
                sha1: sha1.clone(),
            }),
            ManifestNode::Dir {
                name,
                mtime_nanos,
                mode,
                entries,
            } => {
                let mut sub =
                    DirectoryEntry::named(name.clone(), Mtime::from_nanos(*mtime_nanos), *mode);
                fill_children(&mut sub, entries)?;
                Entry::Dir(sub)
            }
        };

        if dir.children.contains_key(entry.name()) {
            return Err(ManifestError::DuplicateName(entry.name().to_string()));
        }
        dir.insert(entry);
    }
    Ok(())
}

/// Serialize a snapshot to a TOML manifest.
pub fn to_toml(snapshot: &Snapshot) -> Result<String, ManifestError> {
    let document = ManifestDocument {
        metadata: Metadata {
            version: SUPPORTED_VERSION,
        },
        collection: CollectionNode {
            name: snapshot.name.clone(),
            root: RootNode {
                mtime_nanos: snapshot.root.mtime.as_nanos(),
                mode: snapshot.root.mode,
                entries: nodes_of(&snapshot.root),
            },
        },
    };
    Ok(toml::to_string_pretty(&document)?)
}

fn nodes_of(dir: &DirectoryEntry) -> Vec<ManifestNode> {
    dir.children
        .values()
        .map(|entry| {
            let name = entry.name().to_string();
            let mtime_nanos = entry.mtime().as_nanos();
            let mode = entry.mode();
            match entry {
                Entry::File(file) => ManifestNode::File {
                    name,
                    mtime_nanos,
                    mode,
                    size: file.size,
                    sha1: file.sha1.clone(),
                },
                Entry::Dir(sub) => ManifestNode::Dir {
                    name,
                    mtime_nanos,
                    mode,
                    entries: nodes_of(sub),
                },
            }
        })
        .collect()
}

/// Load a snapshot from the filesystem.
pub fn load(path: &Path) -> Result<Snapshot, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|e| map_io(e, path))?;
    from_toml(&content)
}

/// Save a snapshot to the filesystem atomically, replacing any previous document.
///
/// Writes to a temporary file, fsyncs it, then atomically renames it into place.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<(), ManifestError> {
    use std::io::Write;

    let content = to_toml(snapshot)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| map_io(e, parent))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| map_io(e, path))?;

    temp_file.as_file().sync_all().map_err(ManifestError::Io)?;

    temp_file.persist(path).map_err(|e| map_io(e.error, path))?;
    debug!("Wrote manifest {}", path.display());

    Ok(())
}

fn map_io(e: std::io::Error, path: &Path) -> ManifestError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ManifestError::PermissionDenied(path.to_path_buf())
    } else {
        ManifestError::Io(e)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Not an immediate subdirectory of the current directory: {0}")]
pub struct InvalidTarget(pub String);

/// Where a tracked tree and its manifest live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    pub tree_root: PathBuf,
    pub manifest_path: PathBuf,
}

impl ManifestLocation {
    /// The current directory, with its manifest inside it.
    pub fn current_dir() -> Self {
        Self::in_tree(Path::new("."))
    }

    /// `base` as the tracked tree, with its manifest inside it.
    pub fn in_tree(base: &Path) -> Self {
        ManifestLocation {
            tree_root: base.to_path_buf(),
            manifest_path: base.join(MANIFEST_FILENAME),
        }
    }

    /// The immediate subdirectory `name` of the current directory, with its
    /// manifest as a sibling named after it.
    pub fn named(name: &str) -> Result<Self, InvalidTarget> {
        Self::named_in(Path::new("."), name)
    }

    /// The immediate subdirectory `name` of `base`, with a sibling manifest.
    pub fn named_in(base: &Path, name: &str) -> Result<Self, InvalidTarget> {
        let name = name.strip_suffix('/').unwrap_or(name);
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(InvalidTarget(name.to_string())),
        }

        Ok(ManifestLocation {
            tree_root: base.join(name),
            manifest_path: base.join(format!("{name}{SIBLING_MANIFEST_SUFFIX}")),
        })
    }

    /// File name of the manifest if it sits directly inside the tracked tree and
    /// therefore has to be skipped when walking it.
    pub fn excluded_name(&self) -> Option<&OsStr> {
        let parent = self.manifest_path.parent()?;
        if parent == self.tree_root {
            self.manifest_path.file_name()
        } else {
            None
        }
    }

    pub fn exists(&self) -> bool {
        self.manifest_path.is_file()
    }
}
