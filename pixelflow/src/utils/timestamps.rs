//! Timestamp helpers.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an RFC 3339 string with millisecond precision.
///
/// # Examples
///
/// ```
/// use pixelflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with('Z'));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso8601(&now_utc())
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as RFC 3339 with millisecond precision.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
