//! Image engine doubles for testing.

use crate::core::Operation;
use crate::errors::{PipelineError, Result};
use crate::imaging::{ImageEngine, OutputFormat, RasterEngine, Transform};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Wraps an engine and sleeps a fixed time per operation before each transform.
///
/// Used to simulate slow stages so that concurrent pipelines overlap.
pub struct DelayedEngine {
    inner: Arc<dyn ImageEngine>,
    mosaic: Duration,
    rotate: Duration,
    resize: Duration,
    calls: Mutex<Vec<(Operation, PathBuf)>>,
}

impl std::fmt::Debug for DelayedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedEngine")
            .field("mosaic", &self.mosaic)
            .field("rotate", &self.rotate)
            .field("resize", &self.resize)
            .finish_non_exhaustive()
    }
}

impl DelayedEngine {
    /// Wraps the raster engine with the same delay for every operation.
    #[must_use]
    pub fn uniform(delay: Duration) -> Self {
        Self::new(Arc::new(RasterEngine::new()), delay, delay, delay)
    }

    /// Wraps `inner` with per-operation delays.
    #[must_use]
    pub fn new(inner: Arc<dyn ImageEngine>, mosaic: Duration, rotate: Duration, resize: Duration) -> Self {
        Self {
            inner,
            mosaic,
            rotate,
            resize,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns the delay applied to `operation`.
    #[must_use]
    pub fn delay_for(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Mosaic => self.mosaic,
            Operation::Rotate => self.rotate,
            Operation::Resize => self.resize,
            Operation::Summary => Duration::ZERO,
        }
    }

    /// Returns the number of transforms run.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the operation and input of each transform, in call order.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<(Operation, PathBuf)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ImageEngine for DelayedEngine {
    async fn apply(&self, transform: &Transform, input: &Path, output: &Path, format: OutputFormat) -> Result<()> {
        self.calls.lock().push((transform.operation(), input.to_path_buf()));
        tokio::time::sleep(self.delay_for(transform.operation())).await;
        self.inner.apply(transform, input, output, format).await
    }
}

/// An engine that writes part of its output and then fails.
#[derive(Debug, Clone)]
pub struct FailingEngine {
    message: String,
}

impl FailingEngine {
    /// Creates an engine failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ImageEngine for FailingEngine {
    async fn apply(&self, _transform: &Transform, _input: &Path, output: &Path, _format: OutputFormat) -> Result<()> {
        tokio::fs::write(output, b"partial").await?;
        Err(PipelineError::Transform(self.message.clone().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_delayed_engine_sleeps_per_operation() {
        let engine = DelayedEngine::new(
            Arc::new(FailingEngine::new("inner")),
            Duration::from_millis(30),
            Duration::from_millis(25),
            Duration::from_millis(20),
        );

        let started = tokio::time::Instant::now();
        let err = engine
            .apply(
                &Transform::Rotate { angle: 90.0 },
                Path::new("in.jpg"),
                Path::new("/nonexistent-dir/out.jpg"),
                OutputFormat::Png,
            )
            .await
            .unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(25));
        assert!(started.elapsed() < Duration::from_millis(30));
        assert_eq!(err.code(), "IO");
        assert_eq!(engine.recorded_calls(), vec![(Operation::Rotate, PathBuf::from("in.jpg"))]);
    }

    #[tokio::test]
    async fn test_failing_engine_leaves_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.tmp1");

        let err = FailingEngine::new("boom")
            .apply(&Transform::Mosaic { block_size: 2 }, Path::new("in.jpg"), &out, OutputFormat::Png)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "TRANSFORM_FAILED");
        assert!(out.exists());
    }
}
