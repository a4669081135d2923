//! Wake-up signal raised whenever an artifact lands at its final path.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Broadcasts "an artifact was just published" to every readiness waiter.
///
/// Waiters still re-check the filesystem on their poll interval, so files
/// written by other processes are picked up too.
#[derive(Debug, Default)]
pub struct ArtifactSignal {
    notify: Notify,
    published: AtomicU64,
}

impl ArtifactSignal {
    /// Creates a new signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes every current waiter.
    pub fn publish(&self) {
        self.published.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns a future completing at the next [`publish`](Self::publish).
    ///
    /// Call `enable()` on the pinned future before checking the condition to
    /// avoid missing a publish that lands in between.
    pub fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }

    /// Returns how many artifacts have been published.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }
}
