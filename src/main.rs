mod checksum;
mod cli;
mod dir_list;
mod duplicates;
mod entry;
mod export;
mod manifest;
mod repair;
mod reporter;
mod snapshot;
mod util;
mod verify;

use anyhow::{Context, bail};
use clap::Parser;
use cli::{Cli, Command};
use entry::{MtimeComparison, Snapshot};
use export::ExportFormat;
use manifest::ManifestLocation;
use reporter::{Reporter, SilentReporter, VerboseReporter};
use std::fmt as stdfmt;
use std::io::{IsTerminal, Write, stderr, stdout};
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use util::format::format_size;
use verify::{VerifyOptions, verify_tree};

struct FilekeepExitCode;

impl FilekeepExitCode {
    /// Exit code used when verification found differences.
    fn verification_failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used for invalid arguments.
    fn usage_error() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used for other errors (I/O errors, malformed manifests, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are reported as errors by clap.
            return if e.use_stderr() {
                FilekeepExitCode::usage_error()
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose, cli.log_level.as_deref());

    let location = match cli.directory.as_deref() {
        Some(name) => match ManifestLocation::named(name) {
            Ok(location) => location,
            Err(e) => {
                error!("{e}");
                return FilekeepExitCode::usage_error();
            }
        },
        None => ManifestLocation::current_dir(),
    };

    let result: anyhow::Result<ExitCode> = match cli.command {
        Command::Create { quiet, name } => handle_create(&location, quiet, name),
        Command::Verify {
            fast,
            touch,
            flexible_mtime,
            ignore_mtime,
        } => {
            let options = VerifyOptions {
                fast,
                touch,
                mtime: mtime_comparison(flexible_mtime, ignore_mtime),
            };
            handle_verify(&location, options)
        }
        Command::Touch { flexible_mtime } => {
            let options = VerifyOptions {
                fast: false,
                touch: true,
                mtime: mtime_comparison(flexible_mtime, false),
            };
            handle_verify(&location, options)
        }
        Command::Duplicates => handle_duplicates(&location),
        Command::Export { format } => handle_export(&location, format),
        Command::Info => handle_info(&location),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err:#}");
            FilekeepExitCode::any_error()
        }
    }
}

fn mtime_comparison(flexible_mtime: bool, ignore_mtime: bool) -> MtimeComparison {
    match (flexible_mtime, ignore_mtime) {
        (_, true) => MtimeComparison::Ignore,
        (true, _) => MtimeComparison::Flexible,
        _ => MtimeComparison::Exact,
    }
}

/// Progress goes to stderr only when someone is watching it.
fn select_reporter(quiet: bool) -> Box<dyn Reporter> {
    if !quiet && stderr().is_terminal() {
        Box::new(VerboseReporter::new(stderr()))
    } else {
        Box::new(SilentReporter)
    }
}

fn load_collection(location: &ManifestLocation) -> anyhow::Result<Snapshot> {
    if !location.exists() {
        bail!(
            "Collection not found: {} (run 'filekeep create' first)",
            location.manifest_path.display()
        );
    }
    manifest::load(&location.manifest_path)
        .with_context(|| format!("Failed to load {}", location.manifest_path.display()))
}

fn handle_create(
    location: &ManifestLocation,
    quiet: bool,
    name: Option<String>,
) -> anyhow::Result<ExitCode> {
    if location.exists() {
        bail!(
            "Collection already exists: {}",
            location.manifest_path.display()
        );
    }

    let name = name.unwrap_or_else(|| Snapshot::DEFAULT_NAME.to_string());
    let mut reporter = select_reporter(quiet);
    reporter.status(&format!("Creating collection: {name}"));

    let result = snapshot::build_snapshot(
        &location.tree_root,
        &name,
        location.excluded_name(),
        reporter.as_mut(),
    )?;

    manifest::save(&result.snapshot, &location.manifest_path)?;

    reporter.status(&format!(
        "{} directories with {} files",
        result.directories, result.files
    ));

    Ok(ExitCode::SUCCESS)
}

fn handle_verify(
    location: &ManifestLocation,
    options: VerifyOptions,
) -> anyhow::Result<ExitCode> {
    let snapshot = load_collection(location)?;
    let mut reporter = select_reporter(false);

    let ok = verify_tree(
        &snapshot,
        &location.tree_root,
        options,
        location.excluded_name(),
        reporter.as_mut(),
    )?;

    if ok {
        info!("Verification successful: {}", snapshot.name);
        Ok(ExitCode::SUCCESS)
    } else {
        error!("Verification failed: {}", snapshot.name);
        Ok(FilekeepExitCode::verification_failed())
    }
}

fn handle_duplicates(location: &ManifestLocation) -> anyhow::Result<ExitCode> {
    let snapshot = load_collection(location)?;
    let groups = duplicates::find_duplicates(&snapshot);

    if groups.is_empty() {
        info!("No duplicates found");
        return Ok(ExitCode::SUCCESS);
    }

    let mut out = stdout().lock();
    for group in &groups {
        writeln!(out, "{}:", group.sha1)?;
        for path in &group.paths {
            writeln!(out, "  {path}")?;
        }
    }

    info!("{} groups of duplicates", groups.len());
    Ok(ExitCode::SUCCESS)
}

fn handle_export(location: &ManifestLocation, format: ExportFormat) -> anyhow::Result<ExitCode> {
    let snapshot = load_collection(location)?;
    let mut out = stdout().lock();
    export::export(&snapshot, format, &mut out)?;
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn handle_info(location: &ManifestLocation) -> anyhow::Result<ExitCode> {
    let snapshot = load_collection(location)?;
    let (directories, files) = snapshot.counts();

    let mut out = stdout().lock();
    writeln!(out, "Name: {}", snapshot.name)?;
    writeln!(out, "Directories: {directories}")?;
    writeln!(out, "Files: {files}")?;
    writeln!(out, "Total size: {}", format_size(snapshot.total_size()))?;

    Ok(ExitCode::SUCCESS)
}

/// Explicit level from the command line, if any. `None` defers to `RUST_LOG`.
fn level_from_flags(verbose: u8, log_level: Option<&str>) -> Option<String> {
    match (log_level, verbose) {
        (Some(level), _) => Some(level.to_string()),
        (None, 0) => None,
        (None, 1) => Some("debug".to_string()),
        (None, _) => Some("trace".to_string()),
    }
}

fn init_tracing(verbose: u8, log_level: Option<&str>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let filter = match level_from_flags(verbose, log_level) {
        Some(level) => EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

#[cfg(test)]
mod tests {
    use super::{level_from_flags, mtime_comparison};
    use crate::entry::MtimeComparison;

    #[test]
    fn log_level_flag_wins_over_verbosity() {
        assert_eq!(level_from_flags(0, Some("warn")), Some("warn".to_string()));
    }

    #[test]
    fn verbosity_count_selects_level() {
        assert_eq!(level_from_flags(1, None), Some("debug".to_string()));
        assert_eq!(level_from_flags(3, None), Some("trace".to_string()));
    }

    #[test]
    fn no_flags_defer_to_environment() {
        assert_eq!(level_from_flags(0, None), None);
    }

    #[test]
    fn ignore_mtime_takes_precedence() {
        assert_eq!(mtime_comparison(false, false), MtimeComparison::Exact);
        assert_eq!(mtime_comparison(true, false), MtimeComparison::Flexible);
        assert_eq!(mtime_comparison(false, true), MtimeComparison::Ignore);
    }
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::TRACE => write!(writer, "🔎 ")?,
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::TRACE => writer.write_str("TRACE: ")?,
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
