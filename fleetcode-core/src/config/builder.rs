// ============================================================================
// fleetcode-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for WorkerConfig
//
// Provides a fluent API for assembling a WorkerConfig. Only the temp
// directory and the policy are required; everything else falls back to the
// DEFAULT_* constants from the parent module.

// ---- Standard library imports ----
use std::path::PathBuf;

// ---- Internal crate imports ----
use super::{Policy, WorkerConfig};
use crate::error::{CoreError, CoreResult};

/// Builder for creating WorkerConfig instances.
///
/// # Examples
///
/// ```rust
/// use fleetcode_core::config::{Policy, WorkerConfigBuilder};
/// use std::path::PathBuf;
///
/// let policy = Policy::from_value(serde_json::json!({
///     "image": { "target_ext": "webp" },
///     "audio": { "target_ext": "ogg" },
///     "video": { "target_ext": "webm" }
/// }));
///
/// let config = WorkerConfigBuilder::new()
///     .temp_dir(PathBuf::from("/tmp/fleetcode"))
///     .policy(policy)
///     .worker_fraction(0.5)
///     .min_segment_secs(30)
///     .keep_backup(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.min_segment_secs, 30);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkerConfigBuilder {
    // Required fields
    temp_dir: Option<PathBuf>,
    policy: Option<Policy>,

    // Optional fields with defaults
    worker_fraction: Option<f64>,
    min_segment_secs: Option<u64>,
    keep_backup: Option<bool>,
    validate_duration: Option<bool>,
    ffmpeg_path: Option<String>,
    ffprobe_path: Option<String>,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory for intermediate files.
    pub fn temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = Some(temp_dir);
        self
    }

    /// Sets the transcode policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the share of logical CPUs used for segment encoding.
    pub fn worker_fraction(mut self, fraction: f64) -> Self {
        self.worker_fraction = Some(fraction);
        self
    }

    /// Sets the minimum segment length in seconds.
    pub fn min_segment_secs(mut self, secs: u64) -> Self {
        self.min_segment_secs = Some(secs);
        self
    }

    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = Some(keep);
        self
    }

    pub fn validate_duration(mut self, validate: bool) -> Self {
        self.validate_duration = Some(validate);
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    pub fn ffprobe_path(mut self, path: impl Into<String>) -> Self {
        self.ffprobe_path = Some(path.into());
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(WorkerConfig)` - The validated configuration
    /// * `Err(CoreError::Config)` - A required field is missing or a value is out of range
    pub fn build(self) -> CoreResult<WorkerConfig> {
        let temp_dir = self
            .temp_dir
            .ok_or_else(|| CoreError::Config("temp directory is required".to_string()))?;
        let policy = self
            .policy
            .ok_or_else(|| CoreError::Config("policy is required".to_string()))?;

        let mut config = WorkerConfig::new(temp_dir, policy);
        if let Some(fraction) = self.worker_fraction {
            config.worker_fraction = fraction;
        }
        if let Some(secs) = self.min_segment_secs {
            config.min_segment_secs = secs;
        }
        if let Some(keep) = self.keep_backup {
            config.keep_backup = keep;
        }
        if let Some(validate) = self.validate_duration {
            config.validate_duration = validate;
        }
        if let Some(path) = self.ffmpeg_path {
            config.ffmpeg_path = path;
        }
        if let Some(path) = self.ffprobe_path {
            config.ffprobe_path = path;
        }

        config.validate()?;
        Ok(config)
    }
}
