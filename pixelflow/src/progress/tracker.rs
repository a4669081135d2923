//! Append-only log of stage lifecycle events.

use super::report::{ConcurrencyReport, TimelineSample};
use crate::core::{ProgressEvent, ProgressStatus};
use crate::utils::duration_ms;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::debug;

/// Records when stages start and finish, relative to one run origin.
///
/// One tracker belongs to one run. Events are appended by concurrently
/// running stages and read back by [`ProgressTracker::summarize`] once the
/// run has finished.
#[derive(Debug)]
pub struct ProgressTracker {
    origin: Mutex<Instant>,
    events: Mutex<Vec<ProgressEvent>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Creates a tracker whose clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Mutex::new(Instant::now()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Restarts the clock and drops all recorded events.
    pub fn reset(&self) {
        let mut events = self.events.lock();
        events.clear();
        *self.origin.lock() = Instant::now();
    }

    /// Milliseconds since the run origin.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        duration_ms(self.origin.lock().elapsed())
    }

    /// Appends an event stamped with the current elapsed time.
    pub fn log_event(&self, stage_id: &str, status: ProgressStatus, duration_ms: Option<u64>) -> ProgressEvent {
        let event = ProgressEvent::new(stage_id, status, self.elapsed_ms(), duration_ms);
        debug!(stage_id, status = %status, elapsed_ms = event.elapsed_ms, "Progress event");
        self.record(event.clone());
        event
    }

    /// Appends a pre-built event.
    pub fn record(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }

    /// Returns a copy of every event in insertion order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Samples the number of in-flight stages every `step_ms` from 0 to the
    /// last recorded elapsed time.
    ///
    /// A stage is in flight at `t` when it started at or before `t` and has no
    /// terminal event at or before `t`. A stage that never finished stays in
    /// flight until the end of the timeline.
    #[must_use]
    pub fn summarize(&self, step_ms: u64) -> ConcurrencyReport {
        let events = self.events();
        let step_ms = step_ms.max(1);

        let intervals = intervals(&events);
        let total_elapsed_ms = events.iter().map(|e| e.elapsed_ms).max().unwrap_or(0);
        let completed = count_status(&events, ProgressStatus::Complete);
        let failed = count_status(&events, ProgressStatus::Error);

        if intervals.is_empty() {
            return ConcurrencyReport {
                total_elapsed_ms,
                completed,
                failed,
                ..ConcurrencyReport::default()
            };
        }

        let timeline: Vec<TimelineSample> = (0..=total_elapsed_ms)
            .step_by(usize::try_from(step_ms).unwrap_or(usize::MAX))
            .map(|t| TimelineSample {
                time_ms: t,
                in_flight: intervals
                    .iter()
                    .filter(|(start, end)| *start <= t && end.map_or(true, |end| end > t))
                    .count(),
            })
            .collect();

        let max_concurrent = timeline.iter().map(|s| s.in_flight).max().unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let average_parallelism =
            timeline.iter().map(|s| s.in_flight).sum::<usize>() as f64 / timeline.len() as f64;

        ConcurrencyReport {
            max_concurrent,
            average_parallelism,
            timeline,
            total_elapsed_ms,
            completed,
            failed,
        }
    }
}

/// Pairs each start with the next terminal event of the same stage.
fn intervals(events: &[ProgressEvent]) -> Vec<(u64, Option<u64>)> {
    let mut ordered: Vec<&ProgressEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.elapsed_ms);

    let mut open: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut spans: Vec<(u64, Option<u64>)> = Vec::new();

    for event in ordered {
        match event.status {
            status if !status.is_terminal() => {
                open.entry(event.stage_id.as_str()).or_default().push(spans.len());
                spans.push((event.elapsed_ms, None));
            }
            _ => {
                let pending = open.get_mut(event.stage_id.as_str()).and_then(|stack| {
                    if stack.is_empty() {
                        None
                    } else {
                        Some(stack.remove(0))
                    }
                });
                if let Some(index) = pending {
                    spans[index].1 = Some(event.elapsed_ms);
                }
            }
        }
    }
    spans
}

fn count_status(events: &[ProgressEvent], status: ProgressStatus) -> usize {
    events.iter().filter(|e| e.status == status).count()
}
