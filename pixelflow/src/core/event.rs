//! Progress event recorded for each stage lifecycle transition.

use super::ProgressStatus;
use serde::{Deserialize, Serialize};

/// One entry in the append-only progress log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// The stage the event belongs to.
    pub stage_id: String,
    /// The lifecycle transition.
    pub status: ProgressStatus,
    /// Milliseconds since the tracker was anchored.
    pub elapsed_ms: u64,
    /// Stage duration, for terminal events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ProgressEvent {
    /// Creates a new progress event.
    #[must_use]
    pub fn new(
        stage_id: impl Into<String>,
        status: ProgressStatus,
        elapsed_ms: u64,
        duration_ms: Option<u64>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            status,
            elapsed_ms,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_skips_missing_duration() {
        let event = ProgressEvent::new("mosaic1", ProgressStatus::Start, 5, None);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["stageId"], "mosaic1");
        assert_eq!(value["status"], "start");
        assert_eq!(value["elapsedMs"], 5);
        assert!(value.get("durationMs").is_none());
    }
}
