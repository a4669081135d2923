//! Temp-file-then-rename writes.

use crate::errors::{PipelineError, Result};
use crate::sync::ArtifactSignal;
use crate::utils::unique_suffix;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Publishes files atomically.
///
/// The producer writes a uniquely named sibling temp file which is then
/// renamed onto the final path, so readers see either no file or a complete
/// one. Each successful publish raises the shared [`ArtifactSignal`].
#[derive(Debug, Clone, Default)]
pub struct AtomicFileWriter {
    signal: Arc<ArtifactSignal>,
}

impl AtomicFileWriter {
    /// Creates a writer that raises `signal` after every publish.
    #[must_use]
    pub fn new(signal: Arc<ArtifactSignal>) -> Self {
        Self { signal }
    }

    /// Returns the signal raised on publish.
    #[must_use]
    pub fn signal(&self) -> &Arc<ArtifactSignal> {
        &self.signal
    }

    /// Runs `produce` against a temp path and renames the result onto `output_path`.
    ///
    /// On producer failure the temp file is removed on a best-effort basis and
    /// the producer's error is returned unchanged.
    pub async fn write_atomically<F, Fut>(&self, output_path: &Path, produce: F) -> Result<()>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).await?;
        }

        let temp_path = temp_path_for(output_path);
        debug!(path = %output_path.display(), temp = %temp_path.display(), "Writing temp file");

        if let Err(err) = produce(temp_path.clone()).await {
            discard_temp(&temp_path).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&temp_path, output_path).await {
            discard_temp(&temp_path).await;
            return Err(err.into());
        }

        self.signal.publish();
        debug!(path = %output_path.display(), "Published artifact");
        Ok(())
    }

    /// Atomically writes `bytes` to `output_path`.
    pub async fn write_bytes(&self, output_path: &Path, bytes: Vec<u8>) -> Result<()> {
        self.write_atomically(output_path, |temp| async move {
            tokio::fs::write(&temp, bytes).await?;
            Ok(())
        })
        .await
    }
}

/// Returns `<output_path>.tmp<unique suffix>`.
#[must_use]
pub fn temp_path_for(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_os_string();
    name.push(".tmp");
    name.push(unique_suffix());
    PathBuf::from(name)
}

async fn discard_temp(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(temp = %temp_path.display(), "Removed temp file"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(temp = %temp_path.display(), error = %err, "Failed to remove temp file"),
    }
}

/// Creates `dir` and its parents.
///
/// A concurrent create of the same directory is not an error. A permission
/// error is downgraded to a warning when the directory is already usable.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let usable = is_dir(dir).await;
            settle_create_error(dir, err, usable)
        }
    }
}

/// Decides whether a failed directory create still leaves `dir` usable.
fn settle_create_error(dir: &Path, err: std::io::Error, usable: bool) -> Result<()> {
    match err.kind() {
        ErrorKind::AlreadyExists if usable => Ok(()),
        ErrorKind::PermissionDenied if usable => {
            warn!(dir = %dir.display(), error = %err, "Directory create denied; using existing directory");
            Ok(())
        }
        _ => Err(PipelineError::Io(err)),
    }
}

async fn is_dir(dir: &Path) -> bool {
    matches!(tokio::fs::metadata(dir).await, Ok(meta) if meta.is_dir())
}
