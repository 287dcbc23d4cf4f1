//! Timestamp helpers for run namespacing and reports.

use chrono::{DateTime, TimeZone, Utc};

/// Format of the per-run artifact directory name.
pub const RUN_TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`
///
/// # Examples
///
/// ```
/// use trainflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Formats an instant as a run directory name, e.g. `03_07_2026_09_05_01`.
#[must_use]
pub fn format_run_timestamp<Tz: TimeZone>(instant: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.format(RUN_TIMESTAMP_FORMAT).to_string()
}
