//! Reference resolution: symbolic names and structured results to concrete paths.

use super::DeclarationTable;
use crate::config::PipelineConfig;
use crate::core::{ArtifactRef, Operation, SourceRef, StageContext};
use crate::errors::{PipelineError, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// What a reference resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// An initial input; present before the run starts.
    Input(PathBuf),
    /// An artifact produced by a stage that may still be running.
    Artifact(PathBuf),
    /// A declared literal value.
    Value(Value),
}

impl Resolved {
    /// Returns the path, if the reference resolved to one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Input(p) | Self::Artifact(p) => Some(p),
            Self::Value(_) => None,
        }
    }

    /// Returns true if a readiness wait is required before reading.
    #[must_use]
    pub fn needs_readiness(&self) -> bool {
        matches!(self, Self::Artifact(_))
    }
}

/// Resolves artifact references against a declaration table.
///
/// Resolution order for text references: a path under a known root is
/// returned unchanged; otherwise a declared input, then a declared stage,
/// then the `<operation><N>` naming convention. Anything else fails with
/// [`PipelineError::UnknownReference`]. No I/O is performed.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    table: Arc<DeclarationTable>,
    input_root: PathBuf,
    output_root: PathBuf,
    extension: String,
    stem_prefix: String,
}

impl ReferenceResolver {
    /// Creates a resolver over `table` using the roots and naming settings of `config`.
    #[must_use]
    pub fn new(table: Arc<DeclarationTable>, config: &PipelineConfig) -> Self {
        Self {
            table,
            input_root: config.input_root.clone(),
            output_root: config.output_root.clone(),
            extension: config.output_extension.clone(),
            stem_prefix: config.input_stem_prefix.clone(),
        }
    }

    /// Returns the declaration table.
    #[must_use]
    pub fn table(&self) -> &DeclarationTable {
        &self.table
    }

    /// Resolves one reference.
    pub fn resolve(&self, reference: &ArtifactRef) -> Result<Resolved> {
        match reference {
            ArtifactRef::Text(text) => self.resolve_text(text),
            ArtifactRef::Structured(map) => {
                let path = PathBuf::from(structured_path(map)?);
                if is_under(&path, &self.input_root) {
                    Ok(Resolved::Input(path))
                } else {
                    Ok(Resolved::Artifact(path))
                }
            }
        }
    }

    /// Resolves a literal path or symbolic name.
    pub fn resolve_text(&self, text: &str) -> Result<Resolved> {
        let as_path = Path::new(text);
        if is_under(as_path, &self.input_root) {
            return Ok(Resolved::Input(as_path.to_path_buf()));
        }
        if is_under(as_path, &self.output_root) {
            return Ok(Resolved::Artifact(as_path.to_path_buf()));
        }
        self.resolve_name(text)
    }

    /// Resolves a symbolic name.
    pub fn resolve_name(&self, name: &str) -> Result<Resolved> {
        if let Some(value) = self.table.inputs.get(name) {
            return Ok(match value.as_str() {
                Some(path) => Resolved::Input(PathBuf::from(path)),
                None => Resolved::Value(value.clone()),
            });
        }
        self.expected_output(name).map(Resolved::Artifact)
    }

    /// Returns the path a stage is expected to write.
    pub fn expected_output(&self, name: &str) -> Result<PathBuf> {
        if let Some(declaration) = self.table.stages.get(name) {
            if let Some(path) = &declaration.output_path {
                return Ok(path.clone());
            }
            let suffix = declaration
                .operation
                .output_suffix()
                .ok_or_else(|| PipelineError::unknown_reference(name))?;
            let base = self.base_name(name)?;
            return Ok(self.convention_path(&base, suffix));
        }

        let (operation, index) =
            parse_convention_name(name).ok_or_else(|| PipelineError::unknown_reference(name))?;
        let suffix = operation
            .output_suffix()
            .ok_or_else(|| PipelineError::unknown_reference(name))?;
        let base = format!("{}{index}", self.stem_prefix);
        Ok(self.convention_path(&base, suffix))
    }

    /// Builds the invocation context for a declared stage.
    ///
    /// The source stays symbolic so that it is resolved, and waited on, when
    /// the stage runs.
    pub fn context_for(&self, stage: &str) -> Result<StageContext> {
        let declaration = self
            .table
            .stages
            .get(stage)
            .ok_or_else(|| PipelineError::unknown_reference(stage))?;
        let source = match (&declaration.source, declaration.operation) {
            (_, Operation::Summary) => SourceRef::Many(
                declaration
                    .inputs
                    .iter()
                    .map(|name| self.summary_input(name))
                    .collect::<Result<_>>()?,
            ),
            (Some(name), _) => SourceRef::from(name.as_str()),
            (None, _) => SourceRef::Many(Vec::new()),
        };
        let output_path = match (&declaration.output_path, declaration.operation) {
            (Some(path), _) => path.clone(),
            (None, Operation::Summary) => self.output_root.join(format!("{stage}.json")),
            (None, _) => self.expected_output(stage)?,
        };

        let mut ctx = StageContext::new(stage, declaration.operation, source, output_path);
        ctx.parameters.clone_from(&declaration.parameters);
        Ok(ctx)
    }

    /// Summary inputs name the artifact they aggregate; literals stay symbolic.
    fn summary_input(&self, name: &str) -> Result<ArtifactRef> {
        Ok(match self.resolve_name(name)? {
            Resolved::Input(path) | Resolved::Artifact(path) => ArtifactRef::path(path),
            Resolved::Value(_) => ArtifactRef::name(name),
        })
    }

    fn convention_path(&self, base: &str, suffix: &str) -> PathBuf {
        self.output_root
            .join(format!("{base}_{suffix}.{}", self.extension))
    }

    /// Follows `source` links back to the initial input and returns its file stem.
    fn base_name(&self, stage: &str) -> Result<String> {
        let mut current = stage.to_string();
        let mut seen = HashSet::new();

        loop {
            if !seen.insert(current.clone()) {
                return Err(PipelineError::unknown_reference(stage));
            }
            if let Some(path) = self.table.input_path(&current) {
                return file_stem(&path).ok_or_else(|| PipelineError::unknown_reference(stage));
            }
            if is_under(Path::new(&current), &self.input_root) {
                return file_stem(Path::new(&current))
                    .ok_or_else(|| PipelineError::unknown_reference(stage));
            }
            match self.table.stages.get(&current).and_then(|d| d.source.clone()) {
                Some(next) => current = next,
                None => return Err(PipelineError::unknown_reference(stage)),
            }
        }
    }
}

/// Extracts the path from a structured reference: `outputPath` first, then `value`.
fn structured_path(map: &Map<String, Value>) -> Result<&str> {
    map.get("outputPath")
        .and_then(Value::as_str)
        .or_else(|| map.get("value").and_then(Value::as_str))
        .ok_or_else(|| {
            PipelineError::invalid_reference("structured reference has no string 'outputPath' or 'value'")
        })
}

/// Parses `<operation><digits>` names such as `rotate2`.
fn parse_convention_name(name: &str) -> Option<(Operation, u32)> {
    [Operation::Mosaic, Operation::Rotate, Operation::Resize]
        .into_iter()
        .find_map(|op| {
            let digits = name.strip_prefix(op.as_str())?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok().map(|index| (op, index))
        })
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Component-wise prefix check that ignores `.` components.
fn is_under(path: &Path, root: &Path) -> bool {
    fn strip(p: &Path) -> Vec<Component<'_>> {
        p.components().filter(|c| !matches!(c, Component::CurDir)).collect()
    }
    let path = strip(path);
    let root = strip(root);
    !root.is_empty() && path.len() > root.len() && path.starts_with(&root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::StageDeclaration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn resolver() -> ReferenceResolver {
        let table = DeclarationTable::new()
            .with_input("image1", "./images/image1.jpg")
            .with_input("portrait", "./images/portrait.png")
            .with_value("threshold", json!(0.5))
            .with_stage("mosaic1", StageDeclaration::new(Operation::Mosaic, "image1"))
            .with_stage("rotate1", StageDeclaration::new(Operation::Rotate, "mosaic1"))
            .with_stage("blurA", StageDeclaration::new(Operation::Resize, "portrait"))
            .with_stage(
                "custom",
                StageDeclaration::new(Operation::Resize, "rotate1").with_output_path("./output/custom.png"),
            )
            .with_stage("loopA", StageDeclaration::new(Operation::Rotate, "loopB"))
            .with_stage("loopB", StageDeclaration::new(Operation::Rotate, "loopA"));
        ReferenceResolver::new(Arc::new(table), &PipelineConfig::default())
    }

    #[test]
    fn test_context_for_declared_stage() {
        let table = DeclarationTable::new()
            .with_input("image2", "./images/image2.jpg")
            .with_stage(
                "mosaic2",
                StageDeclaration::new(Operation::Mosaic, "image2").with_parameter("blockSize", json!(4)),
            );
        let r = ReferenceResolver::new(Arc::new(table), &PipelineConfig::default());

        let ctx = r.context_for("mosaic2").unwrap();
        assert_eq!(ctx.stage_id, "mosaic2");
        assert_eq!(ctx.source_ref, SourceRef::from("image2"));
        assert_eq!(ctx.output_path, PathBuf::from("./output/image2_mosaic.jpg"));
        assert_eq!(ctx.param_u32("blockSize", 10).unwrap(), 4);

        assert_eq!(r.context_for("nope").unwrap_err().code(), "UNKNOWN_REFERENCE");
    }

    #[test]
    fn test_context_for_summary_lists_every_input() {
        let table = DeclarationTable::new()
            .with_input("image1", "./images/image1.jpg")
            .with_value("threshold", json!(0.5))
            .with_stage("mosaic1", StageDeclaration::new(Operation::Mosaic, "image1"))
            .with_stage(
                "thumb",
                StageDeclaration::new(Operation::Resize, "mosaic1").with_output_path("./output/thumb.png"),
            )
            .with_stage("summary", StageDeclaration::summary(["mosaic1", "thumb", "threshold"]));
        let r = ReferenceResolver::new(Arc::new(table), &PipelineConfig::default());

        let ctx = r.context_for("summary").unwrap();
        assert_eq!(
            ctx.source_ref,
            SourceRef::Many(vec![
                ArtifactRef::name("./output/image1_mosaic.jpg"),
                ArtifactRef::name("./output/thumb.png"),
                ArtifactRef::name("threshold"),
            ])
        );
        assert_eq!(ctx.output_path, PathBuf::from("./output/summary.json"));
    }

    #[test]
    fn test_context_for_summary_with_unknown_input() {
        let table = DeclarationTable::new().with_stage("summary", StageDeclaration::summary(["ghost"]));
        let r = ReferenceResolver::new(Arc::new(table), &PipelineConfig::default());
        assert_eq!(r.context_for("summary").unwrap_err().code(), "UNKNOWN_REFERENCE");
    }

    fn structured(value: Value) -> ArtifactRef {
        ArtifactRef::Structured(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_rooted_paths_are_returned_unchanged() {
        let r = resolver();
        assert_eq!(
            r.resolve(&ArtifactRef::name("./images/other.jpg")).unwrap(),
            Resolved::Input(PathBuf::from("./images/other.jpg"))
        );
        assert_eq!(
            r.resolve(&ArtifactRef::name("output/x/y.jpg")).unwrap(),
            Resolved::Artifact(PathBuf::from("output/x/y.jpg"))
        );
    }

    #[test]
    fn test_declared_inputs_and_values() {
        let r = resolver();
        assert_eq!(
            r.resolve_name("image1").unwrap(),
            Resolved::Input(PathBuf::from("./images/image1.jpg"))
        );
        assert_eq!(r.resolve_name("threshold").unwrap(), Resolved::Value(json!(0.5)));
    }

    #[test]
    fn test_declared_stages_follow_convention() {
        let r = resolver();
        assert_eq!(
            r.resolve_name("mosaic1").unwrap(),
            Resolved::Artifact(PathBuf::from("./output/image1_mosaic.jpg"))
        );
        assert_eq!(
            r.resolve_name("rotate1").unwrap(),
            Resolved::Artifact(PathBuf::from("./output/image1_rotated.jpg"))
        );
        assert_eq!(
            r.resolve_name("blurA").unwrap(),
            Resolved::Artifact(PathBuf::from("./output/portrait_final.jpg"))
        );
        assert_eq!(
            r.resolve_name("custom").unwrap(),
            Resolved::Artifact(PathBuf::from("./output/custom.png"))
        );
    }

    #[test]
    fn test_undeclared_convention_names() {
        let r = resolver();
        assert_eq!(
            r.resolve_name("resize3").unwrap(),
            Resolved::Artifact(PathBuf::from("./output/image3_final.jpg"))
        );
        assert_eq!(
            r.resolve_name("rotate12").unwrap(),
            Resolved::Artifact(PathBuf::from("./output/image12_rotated.jpg"))
        );
    }

    #[test]
    fn test_unknown_names_fail() {
        let r = resolver();
        for name in ["sharpen1", "mosaic", "mosaicX", "summary1", "b.jpg", "loopA"] {
            let err = r.resolve_name(name).unwrap_err();
            assert_eq!(err.code(), "UNKNOWN_REFERENCE", "name: {name}");
        }
    }

    #[test]
    fn test_structured_references() {
        let r = resolver();
        assert_eq!(
            r.resolve(&structured(json!({"outputPath": "./output/a.jpg", "value": "ignored"})))
                .unwrap(),
            Resolved::Artifact(PathBuf::from("./output/a.jpg"))
        );
        assert_eq!(
            r.resolve(&structured(json!({"outputPath": 7, "value": "./images/b.jpg"})))
                .unwrap(),
            Resolved::Input(PathBuf::from("./images/b.jpg"))
        );

        let err = r.resolve(&structured(json!({"operation": "mosaic"}))).unwrap_err();
        assert_eq!(err.code(), "INVALID_REFERENCE");
    }

    #[test]
    fn test_readiness_flag() {
        assert!(Resolved::Artifact(PathBuf::from("a")).needs_readiness());
        assert!(!Resolved::Input(PathBuf::from("a")).needs_readiness());
        assert!(Resolved::Value(json!(1)).path().is_none());
    }

    #[test]
    fn test_is_under() {
        assert!(is_under(Path::new("./output/a.jpg"), Path::new("output")));
        assert!(is_under(Path::new("/tmp/run/out/a.jpg"), Path::new("/tmp/run/out")));
        assert!(!is_under(Path::new("./output"), Path::new("./output")));
        assert!(!is_under(Path::new("./outputs/a.jpg"), Path::new("./output")));
    }
}
