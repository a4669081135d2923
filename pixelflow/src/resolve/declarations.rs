//! Static declaration table supplied by the external graph definition.

use crate::core::{Operation, Parameters};
use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// How a non-initial node produces its artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDeclaration {
    /// The producing operation.
    pub operation: Operation,
    /// The upstream node name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Every named input node, in declaration order. Summary stages aggregate these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// An explicit output path, overriding the naming convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Operation parameters declared alongside the stage.
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

impl StageDeclaration {
    /// Creates a declaration reading from `source`.
    #[must_use]
    pub fn new(operation: Operation, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            operation,
            inputs: vec![source.clone()],
            source: Some(source),
            output_path: None,
            parameters: Parameters::new(),
        }
    }

    /// Creates a summary declaration over `inputs`.
    #[must_use]
    pub fn summary<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation: Operation::Summary,
            source: None,
            inputs: inputs.into_iter().map(Into::into).collect(),
            output_path: None,
            parameters: Parameters::new(),
        }
    }

    /// Adds a declared parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Sets an explicit output path.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

/// Maps initial input names to their values and stage names to their declarations.
///
/// Loaded once per run and shared read-only by every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarationTable {
    /// Initial inputs. String values are paths; anything else is a literal.
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    /// Producing stages.
    #[serde(default)]
    pub stages: BTreeMap<String, StageDeclaration>,
}

impl DeclarationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an initial input path.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.inputs
            .insert(name.into(), Value::String(path.to_string_lossy().into_owned()));
        self
    }

    /// Declares an initial literal value.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    /// Declares a producing stage.
    #[must_use]
    pub fn with_stage(mut self, name: impl Into<String>, declaration: StageDeclaration) -> Self {
        self.stages.insert(name.into(), declaration);
        self
    }

    /// Parses a graph definition of the form
    /// `{"nodes": {"image1": {"value": ...}, "mosaic1": {"inputs": {"source": ":image1"}, "params": {...}}}}`.
    ///
    /// Nodes with a `value` become inputs; nodes whose `params.operation` is set
    /// become stage declarations. Other nodes are ignored.
    pub fn from_graph_json(text: &str) -> Result<Self> {
        let graph: Value = serde_json::from_str(text)?;
        let nodes = graph
            .get("nodes")
            .and_then(Value::as_object)
            .ok_or_else(|| PipelineError::Config("graph has no 'nodes' object".into()))?;

        let mut table = Self::new();
        for (name, node) in nodes {
            if let Some(value) = node.get("value") {
                table.inputs.insert(name.clone(), value.clone());
                continue;
            }
            let params = node.get("params");
            let Some(operation) = params
                .and_then(|p| p.get("operation"))
                .and_then(Value::as_str)
            else {
                debug!(node = %name, "Ignoring node without value or operation");
                continue;
            };
            let named_inputs = node.get("inputs").and_then(Value::as_object);
            let source = named_inputs
                .and_then(|i| i.get("source"))
                .and_then(Value::as_str)
                .map(node_name);
            let inputs: Vec<String> = named_inputs
                .map(|i| i.values().filter_map(Value::as_str).map(node_name).collect())
                .unwrap_or_default();
            let output_path = params
                .and_then(|p| p.get("outputPath"))
                .and_then(Value::as_str)
                .map(PathBuf::from);
            let parameters: Parameters = params
                .and_then(Value::as_object)
                .map(|p| {
                    p.iter()
                        .filter(|(key, _)| !matches!(key.as_str(), "operation" | "outputPath"))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default();

            table.stages.insert(
                name.clone(),
                StageDeclaration {
                    operation: operation.parse()?,
                    source,
                    inputs,
                    output_path,
                    parameters,
                },
            );
        }
        Ok(table)
    }

    /// Returns the declared path of an initial input, if it is a path.
    #[must_use]
    pub fn input_path(&self, name: &str) -> Option<PathBuf> {
        self.inputs.get(name).and_then(Value::as_str).map(PathBuf::from)
    }

    /// Checks that every declared input path exists and is non-empty.
    ///
    /// All missing inputs are reported together.
    pub async fn validate_inputs(&self) -> Result<()> {
        let mut missing = Vec::new();
        for name in self.inputs.keys() {
            let Some(path) = self.input_path(name) else {
                continue;
            };
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => {}
                _ => missing.push(path),
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InputNotFound { paths: missing })
        }
    }
}

/// Strips the graph reference syntax (`:name` or `:name.field`) down to the node name.
fn node_name(reference: &str) -> String {
    match reference.strip_prefix(':') {
        Some(rest) => rest.split('.').next().unwrap_or(rest).to_string(),
        None => reference.to_string(),
    }
}
