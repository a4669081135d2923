//! Per-invocation stage context.

use super::{Operation, SourceRef};
use crate::errors::{PipelineError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Scalar stage parameters keyed by name.
pub type Parameters = HashMap<String, Value>;

/// Everything one stage invocation needs.
///
/// Created fresh by the external engine for each invocation and never
/// mutated while the stage runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StageContext {
    /// Unique id of this invocation.
    pub stage_id: String,
    /// The transformation to apply.
    pub operation: Operation,
    /// The upstream reference(s).
    pub source_ref: SourceRef,
    /// Operation parameters.
    pub parameters: Parameters,
    /// Where the stage writes its artifact.
    pub output_path: PathBuf,
}

impl StageContext {
    /// Creates a new stage context with no parameters.
    #[must_use]
    pub fn new(
        stage_id: impl Into<String>,
        operation: Operation,
        source_ref: impl Into<SourceRef>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            operation,
            source_ref: source_ref.into(),
            parameters: Parameters::new(),
            output_path: output_path.into(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Builds a context from the engine's raw JSON invocation.
    pub fn from_json(value: Value) -> Result<Self> {
        let request: StageRequest = serde_json::from_value(value)?;
        Self::try_from(request)
    }

    /// Reads a non-negative integer parameter, falling back to `default` when absent.
    ///
    /// Integral floats and numeric strings are accepted.
    pub fn param_u32(&self, name: &str, default: u32) -> Result<u32> {
        let Some(value) = self.parameters.get(name) else {
            return Ok(default);
        };
        let parsed = match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        parsed
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                PipelineError::invalid_parameter(name, format!("expected a non-negative integer, got {value}"))
            })
    }

    /// Reads a numeric parameter, falling back to `default` when absent.
    pub fn param_f64(&self, name: &str, default: f64) -> Result<f64> {
        let Some(value) = self.parameters.get(name) else {
            return Ok(default);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|f| f.is_finite())
            .ok_or_else(|| PipelineError::invalid_parameter(name, format!("expected a number, got {value}")))
    }
}

/// The raw invocation shape sent by the external engine.
///
/// `operation` is kept as text so an unknown operation surfaces as
/// [`PipelineError::UnsupportedOperation`] rather than a parse error.
/// `outputPath` may sit at the top level or inside `parameters`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    /// Unique id of this invocation.
    pub stage_id: String,
    /// Operation name.
    pub operation: String,
    /// Upstream reference(s).
    pub source_ref: SourceRef,
    /// Operation parameters.
    #[serde(default)]
    pub parameters: Parameters,
    /// Output path, if given at the top level.
    #[serde(default)]
    pub output_path: Option<String>,
}

impl TryFrom<StageRequest> for StageContext {
    type Error = PipelineError;

    fn try_from(request: StageRequest) -> Result<Self> {
        let operation: Operation = request.operation.parse()?;
        let output_path = request
            .output_path
            .or_else(|| {
                request
                    .parameters
                    .get("outputPath")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PipelineError::invalid_parameter("outputPath", "missing"))?;

        Ok(Self {
            stage_id: request.stage_id,
            operation,
            source_ref: request.source_ref,
            parameters: request.parameters,
            output_path: PathBuf::from(output_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactRef;
    use serde_json::json;

    #[test]
    fn test_from_json_with_nested_output_path() {
        let ctx = StageContext::from_json(json!({
            "stageId": "mosaic1",
            "operation": "mosaic",
            "sourceRef": "image1",
            "parameters": {"blockSize": 15, "outputPath": "./output/image1_mosaic.jpg"}
        }))
        .unwrap();

        assert_eq!(ctx.operation, Operation::Mosaic);
        assert_eq!(ctx.source_ref, SourceRef::One(ArtifactRef::name("image1")));
        assert_eq!(ctx.output_path, PathBuf::from("./output/image1_mosaic.jpg"));
        assert_eq!(ctx.param_u32("blockSize", 10).unwrap(), 15);
    }

    #[test]
    fn test_from_json_unknown_operation() {
        let err = StageContext::from_json(json!({
            "stageId": "x",
            "operation": "sepia",
            "sourceRef": "image1",
            "outputPath": "out.jpg"
        }))
        .unwrap_err();

        assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_from_json_missing_output_path() {
        let err = StageContext::from_json(json!({
            "stageId": "x",
            "operation": "rotate",
            "sourceRef": "image1"
        }))
        .unwrap_err();

        assert_eq!(err.code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_param_defaults_and_coercion() {
        let ctx = StageContext::new("r", Operation::Rotate, "image1", "out.jpg")
            .with_parameter("angle", json!("45"))
            .with_parameter("width", json!(200.0))
            .with_parameter("height", json!(-3))
            .with_parameter("flag", json!(true));

        assert_eq!(ctx.param_f64("angle", 90.0).unwrap(), 45.0);
        assert_eq!(ctx.param_u32("width", 300).unwrap(), 200);
        assert_eq!(ctx.param_u32("missing", 300).unwrap(), 300);
        assert!(ctx.param_u32("height", 300).is_err());
        assert!(ctx.param_f64("flag", 0.0).is_err());
    }
}
