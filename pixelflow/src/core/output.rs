//! Stage result type returned to the external engine.

use super::{Operation, RunSummary};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The result of one successful stage.
///
/// Produced exactly once per successful stage and never mutated afterwards.
/// Downstream stages may consume it as an [`ArtifactRef`](super::ArtifactRef).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    /// The artifact written by the stage.
    pub output_path: PathBuf,
    /// The operation that produced it.
    pub operation: Operation,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Completion time (RFC 3339).
    pub timestamp: String,
    /// The producing stage.
    pub stage_id: String,
    /// The aggregate record, for summary stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

impl StageResult {
    /// Creates a new stage result stamped with the current time.
    #[must_use]
    pub fn new(
        stage_id: impl Into<String>,
        operation: Operation,
        output_path: impl Into<PathBuf>,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            output_path: output_path.into(),
            operation,
            processing_time_ms,
            timestamp: crate::utils::iso_timestamp(),
            stage_id: stage_id.into(),
            summary: None,
        }
    }

    /// Attaches a summary record.
    #[must_use]
    pub fn with_summary(mut self, summary: RunSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}
