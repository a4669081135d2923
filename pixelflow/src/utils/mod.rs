//! Utility functions for timestamps, stable hashing and unique names.

mod hashing;
pub mod timestamps;

pub use hashing::{stable_hash, unique_suffix};
pub use timestamps::{duration_ms, format_iso8601, iso_timestamp, now_utc, Timestamp};
