//! Progress and diagnostic sinks for long-running tree walks.
//!
//! The walkers never print on their own. They report through a [`Reporter`]
//! chosen once at startup: [`SilentReporter`] when stderr is not a terminal (or
//! output was asked to be quiet) and [`VerboseReporter`] otherwise.

use std::io::Write;
use tracing::{error, info};

/// Progress lines are redrawn on every this many `advance` calls.
const PROGRESS_THROTTLE: u64 = 500;

const CLEAR_LINE: &str = "\r\x1b[K";

pub trait Reporter {
    /// Announces the total number of bytes the operation will process. Zero
    /// means unknown.
    fn initialize(&mut self, total_bytes: u64);
    fn advance(&mut self, bytes_processed: u64);
    fn status(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

/// Forwards messages to the log and drops progress.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn initialize(&mut self, _total_bytes: u64) {}

    fn advance(&mut self, _bytes_processed: u64) {}

    fn status(&mut self, message: &str) {
        info!("{message}");
    }

    fn error(&mut self, message: &str) {
        error!("{message}");
    }
}

/// Renders a throttled progress indicator to `out`.
pub struct VerboseReporter<W: Write> {
    out: W,
    total: u64,
    done: u64,
    calls: u64,
}

impl<W: Write> VerboseReporter<W> {
    pub fn new(out: W) -> Self {
        VerboseReporter {
            out,
            total: 0,
            done: 0,
            calls: 0,
        }
    }

    fn render(&mut self) {
        // Progress output is best effort; a closed stderr must not abort a walk.
        let _ = if self.total > 0 {
            let percent = self.done as f64 * 100.0 / self.total as f64;
            write!(
                self.out,
                "{CLEAR_LINE}  {percent:.2}% ({}/{})\r",
                self.done, self.total
            )
        } else {
            write!(self.out, "{CLEAR_LINE}  {} bytes\r", self.done)
        };
        if self.total > 0 && self.done == self.total {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
    }

    fn clear(&mut self) {
        let _ = write!(self.out, "{CLEAR_LINE}");
        let _ = self.out.flush();
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for VerboseReporter<W> {
    fn initialize(&mut self, total_bytes: u64) {
        self.total = total_bytes;
        self.done = 0;
        self.calls = 0;
    }

    fn advance(&mut self, bytes_processed: u64) {
        self.done += bytes_processed;
        let finished = self.total > 0 && self.done == self.total;
        if self.calls % PROGRESS_THROTTLE == 0 || finished {
            self.render();
        }
        self.calls += 1;
    }

    fn status(&mut self, message: &str) {
        self.clear();
        info!("{message}");
    }

    fn error(&mut self, message: &str) {
        self.clear();
        error!("{message}");
    }
}

/// Keeps every message, for asserting on the diagnostic stream in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    pub total: u64,
    pub advanced: u64,
    pub statuses: Vec<String>,
    pub errors: Vec<String>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn has_error_starting_with(&self, prefix: &str) -> bool {
        self.errors.iter().any(|e| e.starts_with(prefix))
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn initialize(&mut self, total_bytes: u64) {
        self.total = total_bytes;
    }

    fn advance(&mut self, bytes_processed: u64) {
        self.advanced += bytes_processed;
    }

    fn status(&mut self, message: &str) {
        self.statuses.push(message.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(reporter: VerboseReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_first_advance_renders_percentage() {
        let mut reporter = VerboseReporter::new(Vec::new());
        reporter.initialize(200);
        reporter.advance(50);

        assert_eq!(rendered(reporter), "\r\x1b[K  25.00% (50/200)\r");
    }

    #[test]
    fn test_advances_are_throttled() {
        let mut reporter = VerboseReporter::new(Vec::new());
        reporter.initialize(10_000);
        for _ in 0..600 {
            reporter.advance(1);
        }

        let output = rendered(reporter);
        // Calls 0 and 500 render.
        assert_eq!(output.matches('%').count(), 2);
        assert!(output.contains("(1/10000)"));
        assert!(output.contains("(501/10000)"));
    }

    #[test]
    fn test_completion_always_renders_and_ends_line() {
        let mut reporter = VerboseReporter::new(Vec::new());
        reporter.initialize(3);
        reporter.advance(1);
        reporter.advance(1);
        reporter.advance(1);

        let output = rendered(reporter);
        assert!(output.ends_with("100.00% (3/3)\r\n"));
    }

    #[test]
    fn test_unknown_total_renders_byte_counter() {
        let mut reporter = VerboseReporter::new(Vec::new());
        reporter.initialize(0);
        reporter.advance(4096);

        assert_eq!(rendered(reporter), "\r\x1b[K  4096 bytes\r");
    }

    #[test]
    fn test_messages_clear_progress_line() {
        let mut reporter = VerboseReporter::new(Vec::new());
        reporter.status("hello");
        reporter.error("oops");

        assert_eq!(rendered(reporter), "\r\x1b[K\r\x1b[K");
    }
}
