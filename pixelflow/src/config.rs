//! Configuration for the execution layer.

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`PipelineConfig::input_root`].
pub const ENV_INPUT_ROOT: &str = "PIXELFLOW_INPUT_ROOT";
/// Environment variable overriding [`PipelineConfig::output_root`].
pub const ENV_OUTPUT_ROOT: &str = "PIXELFLOW_OUTPUT_ROOT";
/// Environment variable overriding [`PipelineConfig::readiness_timeout_ms`].
pub const ENV_READINESS_TIMEOUT_MS: &str = "PIXELFLOW_READINESS_TIMEOUT_MS";

/// Configuration shared by every component of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Root under which initial inputs live.
    #[serde(default = "default_input_root")]
    pub input_root: PathBuf,
    /// Root under which stage artifacts are written.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Extension of convention-derived output paths.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
    /// Base-name prefix for undeclared `<operation><N>` names.
    #[serde(default = "default_input_stem_prefix")]
    pub input_stem_prefix: String,
    /// How long a stage waits for an upstream artifact.
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
    /// Readiness poll interval.
    #[serde(default = "default_readiness_poll_ms")]
    pub readiness_poll_ms: u64,
    /// Upper bound between write-lock re-checks.
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,
    /// Stagger delay per slot.
    #[serde(default = "default_stagger_step_ms")]
    pub stagger_step_ms: u64,
    /// Number of stagger slots.
    #[serde(default = "default_stagger_slots")]
    pub stagger_slots: u32,
    /// JPEG encoder quality (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Sampling increment of the concurrency timeline.
    #[serde(default = "default_timeline_step_ms")]
    pub timeline_step_ms: u64,
}

fn default_input_root() -> PathBuf {
    PathBuf::from("./images")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./output")
}

fn default_output_extension() -> String {
    "jpg".to_string()
}

fn default_input_stem_prefix() -> String {
    "image".to_string()
}

fn default_readiness_timeout_ms() -> u64 {
    5_000
}

fn default_readiness_poll_ms() -> u64 {
    100
}

fn default_lock_retry_ms() -> u64 {
    50
}

fn default_stagger_step_ms() -> u64 {
    10
}

fn default_stagger_slots() -> u32 {
    8
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_timeline_step_ms() -> u64 {
    10
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_root: default_output_root(),
            output_extension: default_output_extension(),
            input_stem_prefix: default_input_stem_prefix(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            readiness_poll_ms: default_readiness_poll_ms(),
            lock_retry_ms: default_lock_retry_ms(),
            stagger_step_ms: default_stagger_step_ms(),
            stagger_slots: default_stagger_slots(),
            jpeg_quality: default_jpeg_quality(),
            timeline_step_ms: default_timeline_step_ms(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PIXELFLOW_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup; used by
    /// [`with_env_overrides`](Self::with_env_overrides).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_INPUT_ROOT) {
            self.input_root = PathBuf::from(root);
        }
        if let Some(root) = lookup(ENV_OUTPUT_ROOT) {
            self.output_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(ENV_READINESS_TIMEOUT_MS) {
            self.readiness_timeout_ms = raw.trim().parse().map_err(|_| {
                PipelineError::Config(format!("{ENV_READINESS_TIMEOUT_MS} must be an integer, got '{raw}'"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Sets both roots.
    #[must_use]
    pub fn with_roots(mut self, input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        self.input_root = input_root.into();
        self.output_root = output_root.into();
        self
    }

    /// Sets the readiness timeout and poll interval.
    #[must_use]
    pub fn with_readiness(mut self, timeout_ms: u64, poll_ms: u64) -> Self {
        self.readiness_timeout_ms = timeout_ms;
        self.readiness_poll_ms = poll_ms;
        self
    }

    /// Sets the stagger step; zero disables staggering.
    #[must_use]
    pub fn with_stagger_step_ms(mut self, step_ms: u64) -> Self {
        self.stagger_step_ms = step_ms;
        self
    }

    /// Sets the timeline sampling increment.
    #[must_use]
    pub fn with_timeline_step_ms(mut self, step_ms: u64) -> Self {
        self.timeline_step_ms = step_ms;
        self
    }

    /// Checks that every interval and bound is usable.
    pub fn validate(&self) -> Result<()> {
        if self.readiness_poll_ms == 0 {
            return Err(PipelineError::Config("readinessPollMs must be positive".into()));
        }
        if self.lock_retry_ms == 0 {
            return Err(PipelineError::Config("lockRetryMs must be positive".into()));
        }
        if self.timeline_step_ms == 0 {
            return Err(PipelineError::Config("timelineStepMs must be positive".into()));
        }
        if self.stagger_slots == 0 {
            return Err(PipelineError::Config("staggerSlots must be positive".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PipelineError::Config(format!(
                "jpegQuality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Readiness timeout as Duration.
    #[must_use]
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    /// Readiness poll interval as Duration.
    #[must_use]
    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    /// Lock retry interval as Duration.
    #[must_use]
    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }
}
