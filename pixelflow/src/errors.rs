//! Error types for pixelflow.
//!
//! Every failure is fatal to the stage that raised it. Errors leave the
//! executor as a [`StageError`], which attaches the stage id and operation to
//! the underlying [`PipelineError`] without altering it.

use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Boxed error carried by wrapped transformation failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for pixelflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A structured reference did not carry a usable path.
    #[error("Invalid reference: {reason}")]
    InvalidReference {
        /// What was wrong with the reference.
        reason: String,
    },

    /// A symbolic name matched neither the declaration table nor the naming convention.
    #[error("Unknown reference: '{name}'")]
    UnknownReference {
        /// The unresolved name.
        name: String,
    },

    /// A dependency artifact did not become ready in time.
    #[error("Dependency not ready after {timeout_ms}ms: {}", path.display())]
    DependencyTimeout {
        /// The awaited path.
        path: PathBuf,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// A write lock could not be acquired in time.
    #[error("Write lock '{key}' still held after {timeout_ms}ms")]
    LockTimeout {
        /// The contended lock key.
        key: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// One or more input files are missing.
    #[error("Input not found: {}", display_paths(paths))]
    InputNotFound {
        /// The missing paths.
        paths: Vec<PathBuf>,
    },

    /// The requested operation is not recognised.
    #[error("Unsupported operation: '{0}'")]
    UnsupportedOperation(String),

    /// A stage parameter had the wrong type or an unusable value.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// The parameter name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The image library failed.
    #[error("Transformation failed: {0}")]
    Transform(#[source] BoxError),

    /// A blocking transformation task panicked or was cancelled.
    #[error("Transformation task aborted: {0}")]
    Join(String),

    /// Configuration was invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::Transform(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

impl PipelineError {
    /// Creates an invalid reference error.
    #[must_use]
    pub fn invalid_reference(reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reason: reason.into(),
        }
    }

    /// Creates an unknown reference error.
    #[must_use]
    pub fn unknown_reference(name: impl Into<String>) -> Self {
        Self::UnknownReference { name: name.into() }
    }

    /// Creates an input-not-found error for a single path.
    #[must_use]
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound {
            paths: vec![path.into()],
        }
    }

    /// Creates an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns a stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReference { .. } => "INVALID_REFERENCE",
            Self::UnknownReference { .. } => "UNKNOWN_REFERENCE",
            Self::DependencyTimeout { .. } => "DEPENDENCY_TIMEOUT",
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
            Self::InputNotFound { .. } => "INPUT_NOT_FOUND",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::Transform(_) => "TRANSFORM_FAILED",
            Self::Join(_) => "TASK_ABORTED",
            Self::Config(_) => "CONFIG",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Io(_) => "IO",
        }
    }

    /// Returns true for errors caused by waiting on another stage.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::DependencyTimeout { .. } | Self::LockTimeout { .. })
    }
}

/// A stage failure as reported to the external engine.
#[derive(Debug, Error)]
#[error("Stage '{stage_id}' ({operation}) failed: {source}")]
pub struct StageError {
    /// The failing stage.
    pub stage_id: String,
    /// The operation the stage was running, as requested.
    pub operation: String,
    /// The underlying cause.
    #[source]
    pub source: PipelineError,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage_id: impl Into<String>, operation: impl fmt::Display, source: PipelineError) -> Self {
        Self {
            stage_id: stage_id.into(),
            operation: operation.to_string(),
            source,
        }
    }

    /// Returns the machine-readable code of the underlying cause.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.source.code()
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stageId".to_string(), json!(self.stage_id));
        map.insert("operation".to_string(), json!(self.operation));
        map.insert("code".to_string(), json!(self.code()));
        map.insert("message".to_string(), json!(self.source.to_string()));
        map
    }
}
