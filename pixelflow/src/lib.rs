//! # Pixelflow
//!
//! A concurrency-safe execution layer for parallel image-processing
//! pipelines.
//!
//! An external graph engine schedules stages (mosaic, rotate, resize,
//! summary) concurrently; pixelflow makes that safe:
//!
//! - **Reference resolution**: symbolic stage names and structured results
//!   become concrete paths through one declaration table
//! - **Readiness waiting**: a stage blocks, with a bound, until its upstream
//!   artifact is fully written
//! - **Write locks**: writes to the same output path never interleave
//! - **Atomic publication**: artifacts appear by rename, never half-written
//! - **Progress tracking**: start/complete events summarised into a
//!   concurrency timeline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pixelflow::prelude::*;
//! use std::sync::Arc;
//!
//! let table = DeclarationTable::from_graph_json(&std::fs::read_to_string("graph.json")?)?;
//! let executor = StageExecutor::new(Arc::new(table), PipelineConfig::new().with_env_overrides()?);
//!
//! let contexts = ["mosaic1", "mosaic2", "mosaic3"]
//!     .iter()
//!     .map(|stage| executor.resolver().context_for(stage))
//!     .collect::<Result<Vec<_>>>()?;
//! let results = executor.execute_all(contexts).await;
//! println!("{}", executor.report());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod executor;
pub mod fs;
pub mod imaging;
pub mod observability;
pub mod progress;
pub mod resolve;
pub mod sync;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::core::{
        ArtifactRef, Operation, ProgressEvent, ProgressStatus, RunSummary, SourceRef,
        StageContext, StageResult,
    };
    pub use crate::errors::{PipelineError, Result, StageError};
    pub use crate::executor::StageExecutor;
    pub use crate::fs::AtomicFileWriter;
    pub use crate::imaging::{ImageEngine, RasterEngine, Transform};
    pub use crate::progress::{ConcurrencyReport, ProgressTracker};
    pub use crate::resolve::{DeclarationTable, ReferenceResolver, Resolved, StageDeclaration};
    pub use crate::sync::{ReadinessWaiter, StaggerPolicy, WriteLockRegistry};
}
