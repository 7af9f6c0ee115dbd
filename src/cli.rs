mod help_text;

use crate::export::ExportFormat;
use clap::{ArgAction, Parser, Subcommand};

/// Snapshot a file tree and verify it later against bit-rot and metadata drift
#[derive(Parser, Debug)]
#[command(
    name = "filekeep",
    version,
    about,
    long_about = help_text::ROOT_LONG_ABOUT
)]
pub struct Cli {
    /// Operate on this immediate subdirectory instead of the current directory
    #[arg(short = 'd', long, global = true, value_name = "NAME")]
    pub directory: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        conflicts_with = "log_level"
    )]
    pub verbose: u8,

    /// Log level filter, e.g. "warn" or "filekeep=debug"
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Snapshot the tree into a new collection manifest
    #[command(long_about = help_text::CREATE_LONG_ABOUT)]
    Create {
        /// Do not show a progress indicator
        #[arg(short, long)]
        quiet: bool,

        /// Display name stored in the manifest
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Verify the tree against its manifest, exit with success if nothing differs
    #[command(long_about = help_text::VERIFY_LONG_ABOUT)]
    Verify {
        /// Only checksum files whose metadata differs
        #[arg(long)]
        fast: bool,

        /// Restore recorded modification times and permissions where only those differ
        #[arg(long)]
        touch: bool,

        /// Compare modification times to the whole second
        #[arg(long, conflicts_with = "ignore_mtime")]
        flexible_mtime: bool,

        /// Do not compare modification times at all
        #[arg(long)]
        ignore_mtime: bool,
    },

    /// Verify and restore recorded metadata (same as 'verify --touch')
    Touch {
        /// Compare modification times to the whole second
        #[arg(long)]
        flexible_mtime: bool,
    },

    /// List groups of files with identical content
    Duplicates,

    /// Print a checksum listing of the collection
    #[command(long_about = help_text::EXPORT_LONG_ABOUT)]
    Export {
        /// Output format
        #[arg(long, value_enum, default_value_t = ExportFormat::Sha1sum)]
        format: ExportFormat,
    },

    /// Show the collection name, counts and total size
    Info,
}
