use crate::checksum::{ChecksumError, checksum_file};
use crate::dir_list::{DirListError, FsEntryKind, list_directory, stat_directory};
use crate::entry::{DirectoryEntry, Entry, FileEntry, Mtime, MtimeComparison, Snapshot};
use crate::repair::{RepairAction, RepairError, apply_repairs};
use crate::reporter::Reporter;
use crate::util::format::format_mtime;
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
    #[error("Repair error: {0}")]
    Repair(#[from] RepairError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions {
    /// Skip checksumming files whose size matches, unless a repair is pending
    /// for them.
    pub fast: bool,
    /// Restore recorded modification times and permission bits where only
    /// those differ.
    pub touch: bool,
    pub mtime: MtimeComparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscrepancyKind {
    /// An entry exists on only one side.
    Structural,
    /// Modification time or permission bits differ. Repairable.
    Metadata,
    /// Size or checksum differ. Never repairable.
    Content,
}

/// A single difference between the recorded and the live tree.
///
/// Paths are relative to the tree root and `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    ExtraDirectory(String),
    ExtraFile(String),
    MissingDirectory(String),
    MissingFile(String),
    MtimeMismatch {
        path: String,
        recorded: Mtime,
        live: Mtime,
    },
    ModeMismatch {
        path: String,
        recorded: u32,
        live: u32,
    },
    SizeMismatch {
        path: String,
        recorded: u64,
        live: u64,
    },
    HashMismatch {
        path: String,
        recorded: String,
        live: String,
    },
}

impl Discrepancy {
    pub fn kind(&self) -> DiscrepancyKind {
        match self {
            Discrepancy::ExtraDirectory(_)
            | Discrepancy::ExtraFile(_)
            | Discrepancy::MissingDirectory(_)
            | Discrepancy::MissingFile(_) => DiscrepancyKind::Structural,
            Discrepancy::MtimeMismatch { .. } | Discrepancy::ModeMismatch { .. } => {
                DiscrepancyKind::Metadata
            }
            Discrepancy::SizeMismatch { .. } | Discrepancy::HashMismatch { .. } => {
                DiscrepancyKind::Content
            }
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::ExtraDirectory(path) => write!(f, "extra directory: {path}"),
            Discrepancy::ExtraFile(path) => write!(f, "extra file: {path}"),
            Discrepancy::MissingDirectory(path) => write!(f, "missing directory: {path}"),
            Discrepancy::MissingFile(path) => write!(f, "missing file: {path}"),
            Discrepancy::MtimeMismatch {
                path,
                recorded,
                live,
            } => write!(
                f,
                "mtime differs: {path} (recorded {}, found {})",
                format_mtime(*recorded),
                format_mtime(*live)
            ),
            Discrepancy::ModeMismatch {
                path,
                recorded,
                live,
            } => write!(
                f,
                "mode differs: {path} (recorded {recorded:04o}, found {live:04o})"
            ),
            Discrepancy::SizeMismatch {
                path,
                recorded,
                live,
            } => write!(
                f,
                "size differs: {path} (recorded {recorded} bytes, found {live} bytes)"
            ),
            Discrepancy::HashMismatch {
                path,
                recorded,
                live,
            } => write!(
                f,
                "content differs: {path} (recorded sha1 {recorded}, found {live})"
            ),
        }
    }
}

/// Verify the live tree at `root` against `snapshot`.
///
/// Walks the live tree top-down in lock-step with the snapshot and reports every
/// discrepancy through `reporter.error`, including those that are later
/// repaired. With `options.touch`, metadata-only differences on entries that
/// are otherwise intact are repaired once the whole walk has finished.
///
/// `excluded` names a file directly inside `root` that is not part of the tree
/// (the manifest, when it is stored inside the tree it describes).
///
/// Returns `true` if no unrepaired discrepancy remains.
///
/// # Errors
///
/// I/O failures while listing, checksumming or repairing abort verification.
pub fn verify_tree(
    snapshot: &Snapshot,
    root: &Path,
    options: VerifyOptions,
    excluded: Option<&OsStr>,
    reporter: &mut dyn Reporter,
) -> Result<bool, VerifyError> {
    reporter.initialize(snapshot.total_size());

    let mut walk = Walk {
        options,
        excluded,
        reporter,
        ok: true,
        repairs: Vec::new(),
        tally: Tally::default(),
    };
    walk.run(root, &snapshot.root)?;

    let Walk {
        ok,
        repairs,
        reporter,
        tally,
        ..
    } = walk;

    debug!(
        "{} structural, {} metadata and {} content discrepancies",
        tally.structural, tally.metadata, tally.content
    );

    if options.touch {
        apply_repairs(&repairs, reporter)?;
    }

    Ok(ok)
}

/// A live subdirectory found while visiting its parent, with the recorded
/// directory it matched, if any.
struct Descent<'a> {
    path: PathBuf,
    relative: String,
    recorded: Option<&'a DirectoryEntry>,
}

struct Walk<'r> {
    options: VerifyOptions,
    excluded: Option<&'r OsStr>,
    reporter: &'r mut dyn Reporter,
    /// Cleared by the first hard error.
    ok: bool,
    repairs: Vec<RepairAction>,
    tally: Tally,
}

#[derive(Debug, Default)]
struct Tally {
    structural: usize,
    metadata: usize,
    content: usize,
}

impl<'r> Walk<'r> {
    fn run<'a>(
        &mut self,
        root: &Path,
        recorded_root: &'a DirectoryEntry,
    ) -> Result<(), VerifyError> {
        // Live directory path to the recorded directory it was matched with.
        let mut matched: HashMap<PathBuf, &'a DirectoryEntry> = HashMap::new();
        matched.insert(root.to_path_buf(), recorded_root);

        let mut pending = vec![(root.to_path_buf(), String::new())];

        while let Some((dir_path, relative)) = pending.pop() {
            let Some(&node) = matched.get(&dir_path) else {
                debug!("Skipping unrecorded directory {}", dir_path.display());
                continue;
            };

            let descents = self.visit_directory(&dir_path, &relative, node)?;

            // Reversed so the stack pops subdirectories in listing order.
            for descent in descents.into_iter().rev() {
                if let Some(recorded) = descent.recorded {
                    matched.insert(descent.path.clone(), recorded);
                }
                pending.push((descent.path, descent.relative));
            }
        }

        Ok(())
    }

    fn visit_directory<'a>(
        &mut self,
        dir_path: &Path,
        relative: &str,
        node: &'a DirectoryEntry,
    ) -> Result<Vec<Descent<'a>>, VerifyError> {
        let is_root = relative.is_empty();
        let mut dir_ok = true;
        let mut seen: HashSet<String> = HashSet::new();
        let mut descents = Vec::new();

        for fs_entry in list_directory(dir_path)? {
            if is_root && self.excluded == Some(OsStr::new(&fs_entry.name)) {
                continue;
            }

            let entry_path = dir_path.join(&fs_entry.name);
            let entry_relative = join_relative(relative, &fs_entry.name);

            match fs_entry.kind {
                FsEntryKind::Dir { .. } => {
                    let recorded = match node.get(&fs_entry.name) {
                        Some(Entry::Dir(dir)) => {
                            seen.insert(fs_entry.name);
                            Some(dir)
                        }
                        _ => {
                            self.hard_error(Discrepancy::ExtraDirectory(entry_relative.clone()));
                            dir_ok = false;
                            None
                        }
                    };
                    descents.push(Descent {
                        path: entry_path,
                        relative: entry_relative,
                        recorded,
                    });
                }
                FsEntryKind::File { size, mtime, mode } => {
                    match node.get(&fs_entry.name) {
                        Some(Entry::File(file)) => {
                            seen.insert(fs_entry.name);
                            let live = LiveFile { size, mtime, mode };
                            if !self.check_file(&entry_path, entry_relative, file, live)? {
                                dir_ok = false;
                            }
                        }
                        _ => {
                            self.hard_error(Discrepancy::ExtraFile(entry_relative));
                            dir_ok = false;
                        }
                    }
                }
                FsEntryKind::Other => {
                    debug!(
                        "Skipping {}: not a regular file or directory",
                        entry_path.display()
                    );
                }
            }
        }

        for (name, entry) in node.children.iter() {
            if seen.contains(name.as_str()) {
                continue;
            }
            let entry_relative = join_relative(relative, name);
            let discrepancy = match entry {
                Entry::Dir(_) => Discrepancy::MissingDirectory(entry_relative),
                Entry::File(_) => Discrepancy::MissingFile(entry_relative),
            };
            self.hard_error(discrepancy);
            dir_ok = false;
            self.reporter.advance(entry.total_size());
        }

        if !is_root {
            self.check_directory(dir_path, relative, node, dir_ok)?;
        }

        Ok(descents)
    }

    /// Returns whether the file is free of hard errors.
    fn check_file(
        &mut self,
        path: &Path,
        relative: String,
        recorded: &FileEntry,
        live: LiveFile,
    ) -> Result<bool, VerifyError> {
        let mut ok = true;

        let metadata_differs = self.compare_metadata(
            &relative,
            recorded.mtime,
            recorded.mode,
            live.mtime,
            live.mode,
        );
        let needs_repair = metadata_differs && self.options.touch;
        if metadata_differs && !self.options.touch {
            ok = false;
        }

        if recorded.size != live.size {
            self.report(Discrepancy::SizeMismatch {
                path: relative.clone(),
                recorded: recorded.size,
                live: live.size,
            });
            ok = false;
            self.reporter.advance(recorded.size);
        } else if !self.options.fast || needs_repair {
            // Metadata is only ever restored after the content is proven intact.
            let checksum = checksum_file(path, &mut |n| self.reporter.advance(n))?;
            if checksum.sha1 != recorded.sha1 {
                self.report(Discrepancy::HashMismatch {
                    path: relative.clone(),
                    recorded: recorded.sha1.clone(),
                    live: checksum.sha1,
                });
                ok = false;
            }
        } else {
            self.reporter.advance(recorded.size);
        }

        if !ok {
            self.ok = false;
        } else if needs_repair {
            self.repairs.push(RepairAction {
                path: path.to_path_buf(),
                relative,
                mtime: recorded.mtime,
                mode: recorded.mode,
            });
        }

        Ok(ok)
    }

    fn check_directory(
        &mut self,
        dir_path: &Path,
        relative: &str,
        node: &DirectoryEntry,
        dir_ok: bool,
    ) -> Result<(), VerifyError> {
        let (live_mtime, live_mode) = stat_directory(dir_path)?;

        if !self.compare_metadata(relative, node.mtime, node.mode, live_mtime, live_mode) {
            return Ok(());
        }

        if self.options.touch && dir_ok {
            self.repairs.push(RepairAction {
                path: dir_path.to_path_buf(),
                relative: relative.to_string(),
                mtime: node.mtime,
                mode: node.mode,
            });
        } else {
            self.ok = false;
        }

        Ok(())
    }

    /// Reports mtime and mode differences. Returns whether any were found.
    fn compare_metadata(
        &mut self,
        relative: &str,
        recorded_mtime: Mtime,
        recorded_mode: u32,
        live_mtime: Mtime,
        live_mode: u32,
    ) -> bool {
        let mut differs = false;

        if !self.options.mtime.matches(recorded_mtime, live_mtime) {
            self.report(Discrepancy::MtimeMismatch {
                path: relative.to_string(),
                recorded: recorded_mtime,
                live: live_mtime,
            });
            differs = true;
        }

        if recorded_mode != live_mode {
            self.report(Discrepancy::ModeMismatch {
                path: relative.to_string(),
                recorded: recorded_mode,
                live: live_mode,
            });
            differs = true;
        }

        differs
    }

    fn hard_error(&mut self, discrepancy: Discrepancy) {
        self.report(discrepancy);
        self.ok = false;
    }

    fn report(&mut self, discrepancy: Discrepancy) {
        match discrepancy.kind() {
            DiscrepancyKind::Structural => self.tally.structural += 1,
            DiscrepancyKind::Metadata => self.tally.metadata += 1,
            DiscrepancyKind::Content => self.tally.content += 1,
        }
        self.reporter.error(&discrepancy.to_string());
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveFile {
    size: u64,
    mtime: Mtime,
    mode: u32,
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests;
