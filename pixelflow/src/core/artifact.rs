//! Artifact references passed between stages.

use super::StageResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// A reference to an upstream artifact.
///
/// Text references are either literal paths or symbolic stage names; which
/// one is decided by the resolver against the configured roots. Structured
/// references are result objects from a prior stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactRef {
    /// A literal path or a symbolic stage name.
    Text(String),
    /// A result object carrying `outputPath` (or `value`).
    Structured(Map<String, Value>),
}

impl ArtifactRef {
    /// Creates a reference to a literal path.
    #[must_use]
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Text(path.as_ref().to_string_lossy().into_owned())
    }

    /// Creates a reference to a symbolic stage name.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Text(name.into())
    }

    /// Returns the processing time carried by a structured reference.
    ///
    /// Accepts both `processingTimeMs` and the older `processingTime` key.
    #[must_use]
    pub fn processing_time_ms(&self) -> Option<u64> {
        let Self::Structured(map) = self else {
            return None;
        };
        ["processingTimeMs", "processingTime"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| {
                v.as_u64()
                    .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            })
    }
}

impl From<&StageResult> for ArtifactRef {
    fn from(result: &StageResult) -> Self {
        match serde_json::to_value(result) {
            Ok(Value::Object(map)) => Self::Structured(map),
            _ => Self::path(&result.output_path),
        }
    }
}

impl From<StageResult> for ArtifactRef {
    fn from(result: StageResult) -> Self {
        Self::from(&result)
    }
}

/// The upstream reference of a stage: one artifact, or an ordered list for
/// aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
    /// An ordered list of artifacts.
    Many(Vec<ArtifactRef>),
    /// A single artifact.
    One(ArtifactRef),
}

impl SourceRef {
    /// Returns the references as a slice, in declaration order.
    #[must_use]
    pub fn as_slice(&self) -> &[ArtifactRef] {
        match self {
            Self::Many(refs) => refs,
            Self::One(r) => std::slice::from_ref(r),
        }
    }
}

impl From<ArtifactRef> for SourceRef {
    fn from(r: ArtifactRef) -> Self {
        Self::One(r)
    }
}

impl From<Vec<ArtifactRef>> for SourceRef {
    fn from(refs: Vec<ArtifactRef>) -> Self {
        Self::Many(refs)
    }
}

impl From<&str> for SourceRef {
    fn from(s: &str) -> Self {
        Self::One(ArtifactRef::name(s))
    }
}
