//! Deterministic per-stage start offsets.

use crate::config::PipelineConfig;
use crate::utils::{duration_ms, stable_hash};
use std::time::Duration;
use tracing::debug;

/// Spreads the first filesystem access of concurrently scheduled stages.
///
/// Ids ending in digits (`mosaic2`) map to slot `(N - 1) mod slots`; other ids
/// map through a stable hash. The delay is `slot * step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaggerPolicy {
    step: Duration,
    slots: u32,
}

impl Default for StaggerPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), 8)
    }
}

impl StaggerPolicy {
    /// Creates a policy; `slots` is clamped to at least one.
    #[must_use]
    pub fn new(step: Duration, slots: u32) -> Self {
        Self {
            step,
            slots: slots.max(1),
        }
    }

    /// Creates a policy from `config`.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(Duration::from_millis(config.stagger_step_ms), config.stagger_slots)
    }

    /// A policy that never delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 1)
    }

    /// Returns the slot for `stage_id`.
    #[must_use]
    pub fn slot_for(&self, stage_id: &str) -> u32 {
        let prefix = stage_id.trim_end_matches(|c: char| c.is_ascii_digit());
        let index = stage_id[prefix.len()..].parse::<u64>().ok();

        let raw = match index {
            Some(n) => n.saturating_sub(1),
            None => stable_hash(stage_id),
        };
        // slots >= 1, and the remainder fits in u32
        u32::try_from(raw % u64::from(self.slots)).unwrap_or(0)
    }

    /// Returns the delay for `stage_id`.
    #[must_use]
    pub fn delay_for(&self, stage_id: &str) -> Duration {
        self.step * self.slot_for(stage_id)
    }

    /// Sleeps for the stage's delay.
    pub async fn wait(&self, stage_id: &str) {
        let delay = self.delay_for(stage_id);
        if !delay.is_zero() {
            debug!(stage_id, delay_ms = duration_ms(delay), "Staggering first filesystem access");
            tokio::time::sleep(delay).await;
        }
    }
}
