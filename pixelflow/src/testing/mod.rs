//! Testing utilities for pixelflow runs.
//!
//! This module provides:
//! - Solid-colour input images and pipeline declarations
//! - Image engine doubles (delayed and failing)
//! - Assertions over published artifacts

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_absent, assert_image_dimensions, assert_no_temp_files};
pub use fixtures::{
    pipeline_declaration, three_pipeline_declaration, write_solid_image, PipelineFixture, PIPELINE_COLOURS,
};
pub use mocks::{DelayedEngine, FailingEngine};
