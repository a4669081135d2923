//! Core domain model types for pixelflow.
//!
//! This module contains the data that flows between the external engine
//! and the execution layer:
//! - Operation and progress status enums
//! - Stage context, artifact references and stage results
//! - Progress events and the summary record

mod artifact;
mod context;
mod event;
mod output;
mod status;
mod summary;

pub use artifact::{ArtifactRef, SourceRef};
pub use context::{Parameters, StageContext, StageRequest};
pub use event::ProgressEvent;
pub use output::StageResult;
pub use status::{Operation, ProgressStatus};
pub use summary::{ProcessingTime, RunSummary, SummaryEntry};
