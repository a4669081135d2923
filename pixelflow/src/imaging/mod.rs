//! Image transformations.
//!
//! [`ImageEngine`] is the seam the executor drives; [`RasterEngine`] is the
//! implementation on the `image` crate. The pure pixel operations live in
//! [`ops`] so they can be benchmarked and tested without the async runtime.

mod engine;
pub mod ops;

pub use engine::{ImageEngine, RasterEngine, Transform, DEFAULT_ANGLE, DEFAULT_BLOCK_SIZE, DEFAULT_EDGE};
pub use ops::{ImageMetadata, OutputFormat};
