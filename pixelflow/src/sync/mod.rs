//! Synchronisation primitives for concurrent stages.
//!
//! - [`ReadinessWaiter`]: bounded wait for an upstream artifact
//! - [`WriteLockRegistry`]: mutual exclusion per output key
//! - [`StaggerPolicy`]: deterministic start offsets
//! - [`ArtifactSignal`]: publish notifications shared by writer and waiters

mod locks;
mod readiness;
mod signal;
mod stagger;

pub use locks::{lock_key, WriteLockGuard, WriteLockRegistry, MIN_RETRY_INTERVAL};
pub use readiness::{await_ready, is_ready, ReadinessWaiter, MIN_POLL_INTERVAL};
pub use signal::ArtifactSignal;
pub use stagger::StaggerPolicy;
