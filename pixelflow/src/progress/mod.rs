//! Run progress and concurrency measurement.

mod report;
mod tracker;

pub use report::{ConcurrencyReport, TimelineSample};
pub use tracker::ProgressTracker;
