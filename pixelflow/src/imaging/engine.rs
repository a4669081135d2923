//! The image engine seam used by the stage executor.

use super::ops::{self, OutputFormat};
use crate::core::{Operation, StageContext};
use crate::errors::{PipelineError, Result};
use crate::utils::duration_ms;
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Default mosaic block edge in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 10;
/// Default rotation in degrees.
pub const DEFAULT_ANGLE: f64 = 90.0;
/// Default resize edge in pixels.
pub const DEFAULT_EDGE: u32 = 300;

/// A single image transformation with its parameters resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Pixelate into square blocks.
    Mosaic {
        /// Block edge in pixels.
        block_size: u32,
    },
    /// Rotate clockwise.
    Rotate {
        /// Angle in degrees.
        angle: f64,
    },
    /// Scale and centre-crop to an exact size.
    Resize {
        /// Target width.
        width: u32,
        /// Target height.
        height: u32,
    },
}

impl Transform {
    /// Builds the transform for an image stage from its parameters.
    ///
    /// Missing parameters take their defaults; parameters of the wrong type
    /// fail with [`PipelineError::InvalidParameter`].
    pub fn from_context(ctx: &StageContext) -> Result<Self> {
        let transform = match ctx.operation {
            Operation::Mosaic => Self::Mosaic {
                block_size: ctx.param_u32("blockSize", DEFAULT_BLOCK_SIZE)?,
            },
            Operation::Rotate => Self::Rotate {
                angle: ctx.param_f64("angle", DEFAULT_ANGLE)?,
            },
            Operation::Resize => Self::Resize {
                width: ctx.param_u32("width", DEFAULT_EDGE)?,
                height: ctx.param_u32("height", DEFAULT_EDGE)?,
            },
            Operation::Summary => {
                return Err(PipelineError::UnsupportedOperation(
                    "summary is not an image transform".to_string(),
                ))
            }
        };
        transform.validate()?;
        Ok(transform)
    }

    /// Returns the operation this transform implements.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Mosaic { .. } => Operation::Mosaic,
            Self::Rotate { .. } => Operation::Rotate,
            Self::Resize { .. } => Operation::Resize,
        }
    }

    /// Rejects parameter values no image could satisfy.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Rotate { angle } if !angle.is_finite() => Err(PipelineError::invalid_parameter(
                "angle",
                "must be a finite number",
            )),
            Self::Resize { width: 0, .. } => Err(PipelineError::invalid_parameter(
                "width",
                "must be greater than zero",
            )),
            Self::Resize { height: 0, .. } => Err(PipelineError::invalid_parameter(
                "height",
                "must be greater than zero",
            )),
            _ => Ok(()),
        }
    }

    /// Applies the transform to a decoded image.
    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        match *self {
            Self::Mosaic { block_size } => Ok(ops::pixelate(image, block_size)),
            Self::Rotate { angle } => ops::rotate(image, angle),
            Self::Resize { width, height } => ops::cover(image, width, height),
        }
    }
}

/// Reads images and runs transformations.
///
/// `output` is the temp path chosen by the atomic writer; `format` is derived
/// from the final path because the temp path's extension is meaningless.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Decodes `input`, applies `transform` and encodes the result to `output`.
    async fn apply(&self, transform: &Transform, input: &Path, output: &Path, format: OutputFormat) -> Result<()>;
}

/// [`ImageEngine`] backed by the `image` crate.
///
/// Decoding, pixel work and encoding run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEngine;

impl RasterEngine {
    /// Creates a raster engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageEngine for RasterEngine {
    async fn apply(&self, transform: &Transform, input: &Path, output: &Path, format: OutputFormat) -> Result<()> {
        let transform = *transform;
        let input: PathBuf = input.to_path_buf();
        let output: PathBuf = output.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let image = ops::decode(&input)?;
            let decoded_ms = duration_ms(started.elapsed());

            let transformed = transform.apply(&image)?;
            let transformed_ms = duration_ms(started.elapsed());

            ops::encode(&transformed, &output, format)?;
            debug!(
                operation = %transform.operation(),
                input = %input.display(),
                width = transformed.width(),
                height = transformed.height(),
                decoded_ms,
                transformed_ms,
                total_ms = duration_ms(started.elapsed()),
                "Transform finished"
            );
            Ok(())
        })
        .await?
    }
}
