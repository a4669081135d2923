//! Aggregate record written by the summary operation.

use super::ArtifactRef;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const NOT_AVAILABLE: &str = "N/A";

/// Processing time of a summarised input, or `"N/A"` when the input did not carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingTime {
    /// Known duration in milliseconds.
    Millis(u64),
    /// The input was a plain path.
    NotAvailable,
}

impl Serialize for ProcessingTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Millis(ms) => serializer.serialize_u64(*ms),
            Self::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for ProcessingTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_u64().map_or(Self::NotAvailable, Self::Millis))
    }
}

/// One normalised summary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    /// 1-based position of the input.
    pub pipeline: usize,
    /// The artifact path reported by the input.
    pub output_path: Option<String>,
    /// The input's processing time.
    pub processing_time_ms: ProcessingTime,
}

/// The summary artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Number of inputs received.
    pub total_processed: usize,
    /// When the summary was built (RFC 3339).
    pub completed_at: String,
    /// One row per input, in input order.
    pub results: Vec<SummaryEntry>,
}

impl RunSummary {
    /// Builds a summary from a heterogeneous list of inputs.
    ///
    /// Plain text inputs are reported verbatim. Structured inputs report their
    /// `outputPath` (or `value`) and processing time.
    #[must_use]
    pub fn from_inputs(inputs: &[ArtifactRef]) -> Self {
        let results = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| SummaryEntry {
                pipeline: index + 1,
                output_path: match input {
                    ArtifactRef::Text(text) => Some(text.clone()),
                    ArtifactRef::Structured(map) => map
                        .get("outputPath")
                        .and_then(|v| v.as_str())
                        .or_else(|| map.get("value").and_then(|v| v.as_str()))
                        .map(str::to_string),
                },
                processing_time_ms: input
                    .processing_time_ms()
                    .map_or(ProcessingTime::NotAvailable, ProcessingTime::Millis),
            })
            .collect();

        Self {
            total_processed: inputs.len(),
            completed_at: crate::utils::iso_timestamp(),
            results,
        }
    }

    /// Serializes the summary as pretty-printed JSON.
    pub fn to_pretty_json(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
