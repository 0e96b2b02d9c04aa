//! Configuration structures and constants for the fleetcode-core library.
//!
//! [`WorkerConfig`] drives the transcode pipeline on a worker host,
//! [`DispatcherConfig`] drives the master, and [`Policy`] carries the
//! per-kind encoding rules loaded from the JSON policy file.

mod builder;
mod policy;

use std::path::PathBuf;

use crate::error::{CoreError, CoreResult};

pub use builder::WorkerConfigBuilder;
pub use policy::{MediaKind, Policy};

// Default constants

/// Default capacity of the dispatcher's bounded job queue.
/// Discovery blocks once this many paths are waiting.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default bind address of the master dispatcher.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Minimum segment length in seconds when splitting video.
/// Keeps very short inputs from being cut into degenerate pieces.
pub const DEFAULT_MIN_SEGMENT_SECS: u64 = 16;

/// Fraction of logical CPUs used as segment encoders.
/// Encoders run their own threads, so only a quarter of the cores get a segment.
pub const DEFAULT_WORKER_FRACTION: f64 = 0.25;

/// How many times a path reported as `killed` is handed out again.
pub const DEFAULT_MAX_REQUEUES: u32 = 2;

/// Default executable names for the external tools.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const DEFAULT_FFPROBE: &str = "ffprobe";

/// Archive, text, script and metadata extensions never handed to workers.
pub const EXCLUDED_MISC_EXTENSIONS: &[&str] = &[
    "7z", "rar", "zip", "tar", "lzh", "bin", "cue", "md5", "mds", "mdf", "log", "txt", "lrc",
    "exe", "md", "py", "sample", "go", "mod", "sum", "json", "sh", "gitignore",
];

/// Subtitle extensions.
pub const EXCLUDED_SUBTITLE_EXTENSIONS: &[&str] = &["smi", "srt", "vtt", "ass"];

/// Extensions produced by a previous run.
pub const EXCLUDED_TRANSCODED_EXTENSIONS: &[&str] = &["webm", "ogg", "png"];

/// The full default exclusion list, lowercase and without dots.
pub fn default_excluded_extensions() -> Vec<String> {
    EXCLUDED_MISC_EXTENSIONS
        .iter()
        .chain(EXCLUDED_SUBTITLE_EXTENSIONS)
        .chain(EXCLUDED_TRANSCODED_EXTENSIONS)
        .map(|ext| ext.to_string())
        .collect()
}

/// Configuration of a worker host.
///
/// Built with [`WorkerConfigBuilder`] or [`WorkerConfig::new`]; the policy
/// is mandatory because every pipeline step reads from it.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory holding every intermediate file of a job
    pub temp_dir: PathBuf,

    /// Per-kind encoding rules
    pub policy: Policy,

    /// Share of logical CPUs used as parallel segment encoders
    pub worker_fraction: f64,

    /// Floor for the segment length in seconds
    pub min_segment_secs: u64,

    /// Keep the hidden `.name.ext` backup of the original after a swap
    pub keep_backup: bool,

    /// Compare output and source video durations before swapping
    pub validate_duration: bool,

    /// Encoder executable
    pub ffmpeg_path: String,

    /// Prober executable
    pub ffprobe_path: String,
}

impl WorkerConfig {
    pub fn new(temp_dir: PathBuf, policy: Policy) -> Self {
        Self {
            temp_dir,
            policy,
            worker_fraction: DEFAULT_WORKER_FRACTION,
            min_segment_secs: DEFAULT_MIN_SEGMENT_SECS,
            keep_backup: true,
            validate_duration: true,
            ffmpeg_path: DEFAULT_FFMPEG.to_string(),
            ffprobe_path: DEFAULT_FFPROBE.to_string(),
        }
    }

    /// Number of parallel segment encoders on this host, at least one.
    pub fn segment_workers(&self) -> usize {
        ((num_cpus::get() as f64 * self.worker_fraction).floor() as usize).max(1)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.worker_fraction > 0.0 && self.worker_fraction <= 1.0) {
            return Err(CoreError::Config(format!(
                "worker fraction must be in (0, 1], got {}",
                self.worker_fraction
            )));
        }
        if self.min_segment_secs == 0 {
            return Err(CoreError::Config(
                "minimum segment length must be positive".to_string(),
            ));
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(CoreError::Config("temp directory is empty".to_string()));
        }
        self.policy.validate()
    }
}

/// Configuration of the master dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Directory walked for jobs
    pub root: PathBuf,

    /// Address the request/reply endpoint binds to
    pub bind_addr: String,

    /// Bound of the discovery queue
    pub queue_capacity: usize,

    /// Lowercase extensions, without dots, that are never queued
    pub excluded_extensions: Vec<String>,

    /// Hand out paths reported as `killed` again
    pub requeue_killed: bool,

    /// Upper bound on requeues per path
    pub max_requeues: u32,

    /// Stop serving once every discovered job reached a terminal state
    pub exit_when_done: bool,
}

impl DispatcherConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            excluded_extensions: default_excluded_extensions(),
            requeue_killed: true,
            max_requeues: DEFAULT_MAX_REQUEUES,
            exit_when_done: false,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.root.is_dir() {
            return Err(CoreError::Config(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        if self.queue_capacity == 0 {
            return Err(CoreError::Config(
                "queue capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
