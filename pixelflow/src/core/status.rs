//! Operation and progress status enums.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The transformation a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Block pixelation.
    Mosaic,
    /// Rotation by an arbitrary angle.
    Rotate,
    /// Cover-and-center-crop resize.
    Resize,
    /// JSON aggregate of prior results.
    Summary,
}

impl Operation {
    /// All recognised operations.
    pub const ALL: [Self; 4] = [Self::Mosaic, Self::Rotate, Self::Resize, Self::Summary];

    /// Returns the wire name of the operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mosaic => "mosaic",
            Self::Rotate => "rotate",
            Self::Resize => "resize",
            Self::Summary => "summary",
        }
    }

    /// Returns the file-name suffix used by the output naming convention.
    ///
    /// `summary` has no convention suffix; its output path is always declared.
    #[must_use]
    pub fn output_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Mosaic => Some("mosaic"),
            Self::Rotate => Some("rotated"),
            Self::Resize => Some("final"),
            Self::Summary => None,
        }
    }

    /// Returns true for operations that read a single image.
    #[must_use]
    pub fn is_image_transform(&self) -> bool {
        !matches!(self, Self::Summary)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| PipelineError::UnsupportedOperation(s.to_string()))
    }
}

/// Lifecycle status recorded by the progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// The stage started.
    Start,
    /// The stage completed successfully.
    Complete,
    /// The stage failed.
    Error,
}

impl ProgressStatus {
    /// Returns true if the status ends a stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}
