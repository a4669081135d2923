//! Test fixtures for pipeline runs.

use crate::config::PipelineConfig;
use crate::core::{Operation, StageContext};
use crate::errors::Result;
use crate::imaging::ops::{encode, OutputFormat};
use crate::resolve::{DeclarationTable, ReferenceResolver, StageDeclaration};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fill colours of the three demo inputs.
pub const PIPELINE_COLOURS: [[u8; 3]; 3] = [[255, 100, 100], [100, 255, 100], [100, 100, 255]];

/// Writes a single-colour image, encoded by the path's extension.
pub fn write_solid_image(path: &Path, width: u32, height: u32, rgb: [u8; 3]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    encode(&image, path, OutputFormat::for_path(path, 90))
}

/// Declares `count` independent mosaic -> rotate -> resize pipelines plus a
/// `summary` stage over their resize outputs.
///
/// Inputs are `<input_root>/image<N>.jpg`; outputs follow the naming
/// convention under `output_root`.
#[must_use]
pub fn pipeline_declaration(input_root: &Path, output_root: &Path, count: usize) -> DeclarationTable {
    let mut table = DeclarationTable::new();
    for n in 1..=count {
        table = table
            .with_input(format!("image{n}"), input_root.join(format!("image{n}.jpg")))
            .with_stage(format!("mosaic{n}"), StageDeclaration::new(Operation::Mosaic, format!("image{n}")))
            .with_stage(format!("rotate{n}"), StageDeclaration::new(Operation::Rotate, format!("mosaic{n}")))
            .with_stage(format!("resize{n}"), StageDeclaration::new(Operation::Resize, format!("rotate{n}")));
    }
    table.with_stage(
        "summary",
        StageDeclaration::summary((1..=count).map(|n| format!("resize{n}")))
            .with_output_path(output_root.join("summary.json")),
    )
}

/// The three-pipeline demo declaration.
#[must_use]
pub fn three_pipeline_declaration(input_root: &Path, output_root: &Path) -> DeclarationTable {
    pipeline_declaration(input_root, output_root, 3)
}

/// A run laid out under one root directory: `images/`, `output/` and a
/// declaration table over them.
#[derive(Debug, Clone)]
pub struct PipelineFixture {
    /// Configuration pointing at the fixture's roots.
    pub config: PipelineConfig,
    /// The declared pipelines.
    pub table: Arc<DeclarationTable>,
    /// Number of declared pipelines.
    pub pipelines: usize,
}

impl PipelineFixture {
    /// Declares `pipelines` pipelines under `root` without touching the filesystem.
    #[must_use]
    pub fn new(root: &Path, pipelines: usize) -> Self {
        let config = PipelineConfig::new().with_roots(root.join("images"), root.join("output"));
        let table = pipeline_declaration(&config.input_root, &config.output_root, pipelines);
        Self {
            config,
            table: Arc::new(table),
            pipelines,
        }
    }

    /// Overrides the configuration, keeping the roots.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        let (input_root, output_root) = (self.config.input_root.clone(), self.config.output_root.clone());
        self.config = config.with_roots(input_root, output_root);
        self
    }

    /// Writes a `width` x `height` solid image for every declared input.
    pub fn write_inputs(&self, width: u32, height: u32) -> Result<Vec<PathBuf>> {
        (1..=self.pipelines)
            .map(|n| {
                let path = self.input_path(n);
                let colour = PIPELINE_COLOURS[(n - 1) % PIPELINE_COLOURS.len()];
                write_solid_image(&path, width, height, colour)?;
                Ok(path)
            })
            .collect()
    }

    /// Path of input `n` (1-based).
    #[must_use]
    pub fn input_path(&self, n: usize) -> PathBuf {
        self.config.input_root.join(format!("image{n}.jpg"))
    }

    /// A resolver over the fixture's declarations.
    #[must_use]
    pub fn resolver(&self) -> ReferenceResolver {
        ReferenceResolver::new(self.table.clone(), &self.config)
    }

    /// The mosaic, rotate and resize contexts of pipeline `n`, in order.
    pub fn pipeline_contexts(&self, n: usize) -> Result<Vec<StageContext>> {
        let resolver = self.resolver();
        ["mosaic", "rotate", "resize"]
            .iter()
            .map(|op| resolver.context_for(&format!("{op}{n}")))
            .collect()
    }
}
