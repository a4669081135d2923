//! Executes one stage invocation end to end.

use crate::config::PipelineConfig;
use crate::core::{ArtifactRef, Operation, ProgressStatus, RunSummary, StageContext, StageResult};
use crate::errors::{PipelineError, Result, StageError};
use crate::fs::AtomicFileWriter;
use crate::imaging::{ImageEngine, OutputFormat, RasterEngine, Transform};
use crate::progress::{ConcurrencyReport, ProgressTracker};
use crate::resolve::{DeclarationTable, ReferenceResolver};
use crate::sync::{is_ready, lock_key, ArtifactSignal, ReadinessWaiter, StaggerPolicy, WriteLockRegistry};
use crate::utils::duration_ms;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Runs mosaic, rotate, resize and summary stages safely side by side.
///
/// Every invocation resolves its source, waits for upstream artifacts,
/// staggers its first filesystem access and publishes its output under a
/// per-path write lock through an atomic rename. Progress is recorded on the
/// shared [`ProgressTracker`].
///
/// All collaborators are owned by the executor, so independent runs in one
/// process do not share state unless they are given the same registry or
/// tracker explicitly.
#[derive(Clone)]
pub struct StageExecutor {
    config: PipelineConfig,
    resolver: ReferenceResolver,
    waiter: ReadinessWaiter,
    locks: Arc<WriteLockRegistry>,
    writer: AtomicFileWriter,
    engine: Arc<dyn ImageEngine>,
    tracker: Arc<ProgressTracker>,
    stagger: StaggerPolicy,
}

impl fmt::Debug for StageExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageExecutor")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("locks_held", &self.locks.len())
            .field("events", &self.tracker.len())
            .field("stagger", &self.stagger)
            .finish_non_exhaustive()
    }
}

impl StageExecutor {
    /// Creates an executor over `table` with the production image engine.
    #[must_use]
    pub fn new(table: Arc<DeclarationTable>, config: PipelineConfig) -> Self {
        let signal = Arc::new(ArtifactSignal::new());
        Self {
            resolver: ReferenceResolver::new(table, &config),
            waiter: ReadinessWaiter::from_config(signal.clone(), &config),
            locks: Arc::new(WriteLockRegistry::new(config.lock_retry())),
            writer: AtomicFileWriter::new(signal),
            engine: Arc::new(RasterEngine::new()),
            tracker: Arc::new(ProgressTracker::new()),
            stagger: StaggerPolicy::from_config(&config),
            config,
        }
    }

    /// Replaces the image engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn ImageEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Shares a lock registry with other executors.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<WriteLockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    /// Shares a progress tracker with other executors.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Replaces the stagger policy.
    #[must_use]
    pub fn with_stagger(mut self, stagger: StaggerPolicy) -> Self {
        self.stagger = stagger;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the reference resolver.
    #[must_use]
    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Returns the write lock registry.
    #[must_use]
    pub fn locks(&self) -> &Arc<WriteLockRegistry> {
        &self.locks
    }

    /// Returns the progress tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    /// Summarizes the recorded progress at the configured timeline step.
    #[must_use]
    pub fn report(&self) -> ConcurrencyReport {
        self.tracker.summarize(self.config.timeline_step_ms)
    }

    /// Executes a raw JSON invocation from the external engine.
    pub async fn invoke(&self, request: Value) -> std::result::Result<StageResult, StageError> {
        let field = |name: &str| {
            request
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let (stage_id, operation) = (field("stageId"), field("operation"));

        match StageContext::from_json(request) {
            Ok(ctx) => self.execute(ctx).await,
            Err(err) => {
                error!(stage_id = %stage_id, operation = %operation, code = err.code(), error = %err, "Rejected stage invocation");
                Err(StageError::new(stage_id, operation, err))
            }
        }
    }

    /// Executes one stage.
    ///
    /// Failures carry the stage id and operation and leave no file at the
    /// output path. Any write lock taken is released on every exit path.
    pub async fn execute(&self, ctx: StageContext) -> std::result::Result<StageResult, StageError> {
        let span = info_span!("stage", stage_id = %ctx.stage_id, operation = %ctx.operation);
        async {
            self.tracker.log_event(&ctx.stage_id, ProgressStatus::Start, None);
            info!(output = %ctx.output_path.display(), "Stage started");
            let started = Instant::now();

            let outcome = if ctx.operation.is_image_transform() {
                self.run_transform(&ctx).await
            } else {
                self.run_summary(&ctx).await
            };
            let elapsed_ms = duration_ms(started.elapsed());

            match outcome {
                Ok(summary) => {
                    self.tracker
                        .log_event(&ctx.stage_id, ProgressStatus::Complete, Some(elapsed_ms));
                    info!(elapsed_ms, output = %ctx.output_path.display(), "Stage completed");
                    let result = StageResult::new(&ctx.stage_id, ctx.operation, &ctx.output_path, elapsed_ms);
                    Ok(match summary {
                        Some(summary) => result.with_summary(summary),
                        None => result,
                    })
                }
                Err(err) => {
                    self.tracker
                        .log_event(&ctx.stage_id, ProgressStatus::Error, Some(elapsed_ms));
                    if err.is_timeout() {
                        warn!(elapsed_ms, code = err.code(), error = %err, "Stage gave up waiting");
                    } else {
                        error!(elapsed_ms, code = err.code(), error = %err, "Stage failed");
                    }
                    Err(StageError::new(ctx.stage_id.clone(), ctx.operation, err))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Executes stages concurrently on the current task, in input order.
    pub async fn execute_all(
        &self,
        contexts: impl IntoIterator<Item = StageContext>,
    ) -> Vec<std::result::Result<StageResult, StageError>> {
        futures::future::join_all(contexts.into_iter().map(|ctx| self.execute(ctx))).await
    }

    async fn run_transform(&self, ctx: &StageContext) -> Result<Option<RunSummary>> {
        let transform = Transform::from_context(ctx)?;
        let reference = single_source(ctx)?;

        self.stagger.wait(&ctx.stage_id).await;
        let input = self.ready_input(reference).await?;
        let format = OutputFormat::for_path(&ctx.output_path, self.config.jpeg_quality);

        self.publish(ctx.operation, &ctx.output_path, |temp| async move {
            self.engine.apply(&transform, &input, &temp, format).await
        })
        .await?;
        Ok(None)
    }

    async fn run_summary(&self, ctx: &StageContext) -> Result<Option<RunSummary>> {
        let summary = RunSummary::from_inputs(ctx.source_ref.as_slice());
        let bytes = summary.to_pretty_json()?.into_bytes();
        debug!(total_processed = summary.total_processed, "Aggregated summary");

        self.stagger.wait(&ctx.stage_id).await;
        self.publish(ctx.operation, &ctx.output_path, |temp| async move {
            tokio::fs::write(&temp, bytes).await?;
            Ok(())
        })
        .await?;
        Ok(Some(summary))
    }

    /// Resolves `reference` to a readable input path.
    async fn ready_input(&self, reference: &ArtifactRef) -> Result<PathBuf> {
        let resolved = self.resolver.resolve(reference)?;
        let Some(path) = resolved.path().map(Path::to_path_buf) else {
            return Err(PipelineError::invalid_reference(format!(
                "declared value {reference:?} is not an image path"
            )));
        };

        if resolved.needs_readiness() {
            self.waiter.await_ready(&path).await?;
        } else if !is_ready(&path).await {
            return Err(PipelineError::input_not_found(path));
        }
        Ok(path)
    }

    /// Writes under the `(operation, output)` lock through a temp file.
    async fn publish<F, Fut>(&self, operation: Operation, output: &Path, produce: F) -> Result<()>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let key = lock_key(operation, output);
        let guard = self.locks.acquire(key).await;
        debug!(lock_key = guard.key(), "Write lock acquired");

        let written = self.writer.write_atomically(output, produce).await;
        self.locks.release(guard);
        written
    }
}

fn single_source(ctx: &StageContext) -> Result<&ArtifactRef> {
    match ctx.source_ref.as_slice() {
        [one] => Ok(one),
        [] => Err(PipelineError::invalid_reference("image stages need a source")),
        many => Err(PipelineError::invalid_reference(format!(
            "{} takes one source, got {}",
            ctx.operation,
            many.len()
        ))),
    }
}
