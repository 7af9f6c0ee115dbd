use crate::entry::Snapshot;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    /// `<hash> *<path>` lines readable by `sha1sum -c`.
    #[default]
    Sha1sum,
}

/// Write one line per file in traversal order.
///
/// Paths always use `/` separators so the listing is portable.
pub fn export<W: Write>(
    snapshot: &Snapshot,
    format: ExportFormat,
    out: &mut W,
) -> io::Result<()> {
    match format {
        ExportFormat::Sha1sum => {
            for (path, file) in snapshot.files() {
                writeln!(out, "{} *{}", file.sha1, path)?;
            }
        }
    }
    Ok(())
}
