//! Human-readable renderings of sizes and timestamps for messages.

use crate::entry::Mtime;
use chrono::{DateTime, Local};

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes == 1 {
        "1 byte".to_string()
    } else {
        format!("{} bytes", bytes)
    }
}

/// Local time with full nanosecond precision, so that timestamps differing only
/// below the second still render differently.
pub(crate) fn format_mtime(mtime: Mtime) -> String {
    match DateTime::from_timestamp(mtime.seconds(), mtime.subsec_nanos()) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.9f")
            .to_string(),
        None => format!("{} ns", mtime.as_nanos()),
    }
}
