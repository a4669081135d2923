//! Concurrency summary of a finished run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of stages in flight at one sampled instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSample {
    /// Milliseconds since the run origin.
    pub time_ms: u64,
    /// Stages started but not yet finished at `time_ms`.
    pub in_flight: usize,
}

/// Result of [`ProgressTracker::summarize`](super::ProgressTracker::summarize).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyReport {
    /// Highest sampled in-flight count.
    pub max_concurrent: usize,
    /// Mean in-flight count over all samples.
    pub average_parallelism: f64,
    /// The samples, in time order.
    pub timeline: Vec<TimelineSample>,
    /// Elapsed time of the last recorded event.
    pub total_elapsed_ms: u64,
    /// Number of `complete` events.
    pub completed: usize,
    /// Number of `error` events.
    pub failed: usize,
}

impl ConcurrencyReport {
    /// Returns true if at least two stages ever ran at the same time.
    #[must_use]
    pub fn overlapped(&self) -> bool {
        self.max_concurrent > 1
    }

    /// Ratio of a sequential baseline to this run's elapsed time.
    #[must_use]
    pub fn speedup_over(&self, sequential_ms: u64) -> Option<f64> {
        if self.total_elapsed_ms == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(sequential_ms as f64 / self.total_elapsed_ms as f64)
    }
}

impl fmt::Display for ConcurrencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "maxConcurrent={} averageParallelism={:.2} completed={} failed={} elapsed={}ms",
            self.max_concurrent, self.average_parallelism, self.completed, self.failed, self.total_elapsed_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display() {
        let report = ConcurrencyReport {
            max_concurrent: 3,
            average_parallelism: 2.0 / 3.0,
            completed: 9,
            total_elapsed_ms: 120,
            ..ConcurrencyReport::default()
        };
        assert_eq!(
            report.to_string(),
            "maxConcurrent=3 averageParallelism=0.67 completed=9 failed=0 elapsed=120ms"
        );
        assert!(report.overlapped());
    }

    #[test]
    fn test_speedup() {
        let report = ConcurrencyReport {
            total_elapsed_ms: 100,
            ..ConcurrencyReport::default()
        };
        assert_eq!(report.speedup_over(250), Some(2.5));
        assert_eq!(ConcurrencyReport::default().speedup_over(250), None);
    }

    #[test]
    fn test_serialized_shape() {
        let report = ConcurrencyReport {
            max_concurrent: 2,
            average_parallelism: 1.5,
            timeline: vec![
                TimelineSample { time_ms: 0, in_flight: 2 },
                TimelineSample { time_ms: 10, in_flight: 1 },
            ],
            ..ConcurrencyReport::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["maxConcurrent"], 2);
        assert_eq!(value["averageParallelism"], 1.5);
        assert_eq!(value["timeline"][1], json!({"timeMs": 10, "inFlight": 1}));
    }
}
