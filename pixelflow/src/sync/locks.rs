//! Process-local write locks keyed by operation and output path.

use crate::core::Operation;
use crate::errors::{PipelineError, Result};
use crate::utils::duration_ms;
use dashmap::DashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Shortest interval between retries of a contended key.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Builds the lock key for a write: `operation:outputPath`.
#[must_use]
pub fn lock_key(operation: Operation, output_path: &Path) -> String {
    format!("{operation}:{}", output_path.display())
}

/// Registry of output keys currently being written.
///
/// At most one holder per key at any instant. Waiters are woken when any key
/// is released and otherwise re-check every `retry_interval`. This is not a
/// cross-process lock.
#[derive(Debug)]
pub struct WriteLockRegistry {
    held: DashSet<String>,
    released: Notify,
    retry_interval: Duration,
}

impl Default for WriteLockRegistry {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl WriteLockRegistry {
    /// Creates a registry that re-checks contended keys every `retry_interval`,
    /// but no more often than [`MIN_RETRY_INTERVAL`].
    #[must_use]
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            held: DashSet::new(),
            released: Notify::new(),
            retry_interval: retry_interval.max(MIN_RETRY_INTERVAL),
        }
    }

    /// Returns the retry interval.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Acquires `key`, waiting as long as it takes.
    pub async fn acquire(self: &Arc<Self>, key: impl Into<String>) -> WriteLockGuard {
        let key = key.into();
        let mut waits: u32 = 0;

        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if self.held.insert(key.clone()) {
                if waits > 0 {
                    debug!(lock_key = %key, waits, "Write lock acquired after contention");
                }
                return WriteLockGuard {
                    registry: Arc::clone(self),
                    key,
                };
            }

            waits += 1;
            debug!(lock_key = %key, waits, "Write lock busy");
            tokio::select! {
                () = &mut released => {}
                () = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }

    /// Acquires `key`, failing with [`PipelineError::LockTimeout`] after `timeout`.
    pub async fn acquire_timeout(self: &Arc<Self>, key: impl Into<String>, timeout: Duration) -> Result<WriteLockGuard> {
        let key = key.into();
        tokio::time::timeout(timeout, self.acquire(key.clone()))
            .await
            .map_err(|_| PipelineError::LockTimeout {
                key,
                timeout_ms: duration_ms(timeout),
            })
    }

    /// Releases a held key. Dropping the guard has the same effect.
    pub fn release(&self, guard: WriteLockGuard) {
        drop(guard);
    }

    /// Returns true if `key` is currently held.
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(key)
    }

    /// Returns the number of held keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns true if no key is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    fn remove(&self, key: &str) {
        self.held.remove(key);
        self.released.notify_waiters();
    }
}

/// Proof of holding a write lock; releases the key when dropped.
#[derive(Debug)]
pub struct WriteLockGuard {
    registry: Arc<WriteLockRegistry>,
    key: String,
}

impl WriteLockGuard {
    /// Returns the held key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for WriteLockGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn test_lock_key_format() {
        assert_eq!(
            lock_key(Operation::Resize, Path::new("./output/image1_final.jpg")),
            "resize:./output/image1_final.jpg"
        );
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let registry = Arc::new(WriteLockRegistry::default());
        let guard = registry.acquire("mosaic:a.jpg").await;

        assert!(registry.is_held("mosaic:a.jpg"));
        assert_eq!(guard.key(), "mosaic:a.jpg");

        registry.release(guard);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let registry = Arc::new(WriteLockRegistry::default());
        let _a = registry.acquire("rotate:a.jpg").await;
        let b = registry
            .acquire_timeout("rotate:b.jpg", Duration::from_millis(50))
            .await;
        assert!(b.is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_acquire_timeout_when_held() {
        let registry = Arc::new(WriteLockRegistry::new(Duration::from_millis(5)));
        let _held = registry.acquire("resize:a.jpg").await;

        let err = registry
            .acquire_timeout("resize:a.jpg", Duration::from_millis(40))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LOCK_TIMEOUT");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mutual_exclusion_under_contention() {
        let registry = Arc::new(WriteLockRegistry::new(Duration::from_millis(5)));
        let inside = Arc::new(AtomicUsize::new(0));
        let origin = Instant::now();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let inside = inside.clone();
                tokio::spawn(async move {
                    let guard = registry.acquire("mosaic:shared.jpg").await;
                    let entered = origin.elapsed();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0, "two holders at once");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    let left = origin.elapsed();
                    drop(guard);
                    (entered, left)
                })
            })
            .collect();

        let mut intervals = Vec::new();
        for task in tasks {
            intervals.push(task.await.unwrap());
        }
        intervals.sort();

        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlapping holds: {pair:?}");
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_zero_retry_interval_is_clamped() {
        let registry = Arc::new(WriteLockRegistry::new(Duration::ZERO));
        assert_eq!(registry.retry_interval(), MIN_RETRY_INTERVAL);

        let _held = registry.acquire("rotate:a.jpg").await;
        let err = registry
            .acquire_timeout("rotate:a.jpg", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LOCK_TIMEOUT");
    }

    #[tokio::test]
    async fn test_release_on_panic() {
        let registry = Arc::new(WriteLockRegistry::default());
        let task = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let _guard = registry.acquire("summary:s.json").await;
                panic!("stage blew up");
            })
        };

        assert!(task.await.is_err());
        assert!(!registry.is_held("summary:s.json"));
    }
}
