//! Bounded wait for an upstream artifact to materialise.

use super::ArtifactSignal;
use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::utils::duration_ms;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Shortest interval between readiness checks.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Waits until a dependency exists with a non-zero size.
///
/// Wakes on the shared [`ArtifactSignal`] or on the poll interval, whichever
/// comes first. The size check is a second line of defence; atomic
/// publication is what keeps readers from seeing partial files.
#[derive(Debug, Clone)]
pub struct ReadinessWaiter {
    signal: Arc<ArtifactSignal>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReadinessWaiter {
    /// Creates a waiter with explicit bounds; `poll_interval` is at least [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn new(signal: Arc<ArtifactSignal>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            signal,
            timeout,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Creates a waiter using the bounds of `config`.
    #[must_use]
    pub fn from_config(signal: Arc<ArtifactSignal>, config: &PipelineConfig) -> Self {
        Self::new(signal, config.readiness_timeout(), config.readiness_poll())
    }

    /// Returns the configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the interval between checks.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Waits for `path` with the configured bounds.
    pub async fn await_ready(&self, path: &Path) -> Result<()> {
        self.await_ready_with(path, self.timeout, self.poll_interval).await
    }

    /// Waits for `path` with explicit bounds.
    ///
    /// Fails with [`PipelineError::DependencyTimeout`] if the file is still
    /// missing or empty once `timeout` has elapsed.
    pub async fn await_ready_with(&self, path: &Path, timeout: Duration, poll_interval: Duration) -> Result<()> {
        let started = Instant::now();
        let deadline = started + timeout;
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let mut checks: u32 = 0;

        loop {
            let published = self.signal.notified();
            tokio::pin!(published);
            published.as_mut().enable();

            checks += 1;
            if is_ready(path).await {
                if checks > 1 {
                    debug!(
                        path = %path.display(),
                        checks,
                        waited_ms = duration_ms(started.elapsed()),
                        "Dependency ready"
                    );
                }
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PipelineError::DependencyTimeout {
                    path: path.to_path_buf(),
                    timeout_ms: duration_ms(timeout),
                });
            }

            debug!(path = %path.display(), checks, "Waiting for dependency");
            let wake_at = (now + poll_interval).min(deadline);
            tokio::select! {
                () = &mut published => {}
                () = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }
}

/// Waits for `path` using polling only.
pub async fn await_ready(path: &Path, timeout: Duration, poll_interval: Duration) -> Result<()> {
    ReadinessWaiter::new(Arc::new(ArtifactSignal::new()), timeout, poll_interval)
        .await_ready(path)
        .await
}

/// Returns true if `path` is a regular file with a non-zero size.
pub async fn is_ready(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn test_returns_immediately_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ready.jpg");
        std::fs::write(&path, b"pixels").unwrap();

        let started = StdInstant::now();
        await_ready(&path, Duration::from_millis(500), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_waits_for_zero_then_nonzero_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.jpg");
        std::fs::write(&path, b"").unwrap();

        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                tokio::fs::write(&path, b"pixels").await.unwrap();
            })
        };

        let started = StdInstant::now();
        await_ready(&path, Duration::from_millis(2_000), Duration::from_millis(20))
            .await
            .unwrap();
        let waited = started.elapsed();

        writer.await.unwrap();
        assert!(waited >= Duration::from_millis(50), "returned too early: {waited:?}");
        assert!(waited < Duration::from_millis(1_000), "returned too late: {waited:?}");
    }

    #[tokio::test]
    async fn test_times_out_on_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();

        let started = StdInstant::now();
        let err = await_ready(&path, Duration::from_millis(120), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "DEPENDENCY_TIMEOUT");
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert!(started.elapsed() < Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_is_clamped() {
        let waiter = ReadinessWaiter::new(Arc::new(ArtifactSignal::new()), Duration::from_millis(50), Duration::ZERO);
        assert_eq!(waiter.poll_interval(), MIN_POLL_INTERVAL);

        let dir = tempfile::tempdir().unwrap();
        let err = waiter
            .await_ready_with(&dir.path().join("never.jpg"), Duration::from_millis(50), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DEPENDENCY_TIMEOUT");
    }

    #[tokio::test]
    async fn test_signal_wakes_before_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signalled.jpg");
        let signal = Arc::new(ArtifactSignal::new());
        let waiter = ReadinessWaiter::new(signal.clone(), Duration::from_secs(5), Duration::from_secs(2));

        let publisher = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                tokio::fs::write(&path, b"pixels").await.unwrap();
                signal.publish();
            })
        };

        let started = StdInstant::now();
        waiter.await_ready(&path).await.unwrap();
        publisher.await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_directory_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_ready(dir.path()).await);
    }
}
