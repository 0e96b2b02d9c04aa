// ============================================================================
// fleetcode-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: Encoder and Prober Boundaries
//
// This module encapsulates every interaction with the external ffmpeg and
// ffprobe executables. The pipeline only sees the Transcoder and Prober
// traits, so tests can substitute in-process fakes.
//
// KEY COMPONENTS:
// - Transcoder: run one encoder invocation with an argument list
// - Prober: stream list, video duration and frame count of a file
// - FfmpegTranscoder / FfprobeProber: subprocess implementations
// - Argument builders for encode, split, concat and mux invocations
// - Dependency checking

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult};
use crate::media::StreamDescriptor;

// ---- Standard library imports ----
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

// ============================================================================
// SUBMODULES
// ============================================================================

/// Subprocess runner shared by both tools
pub mod command;

/// Encoder adapter and argument builders
pub mod ffmpeg;

/// Prober adapter
pub mod ffprobe;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use command::{CommandOutput, run_command};
pub use ffmpeg::FfmpegTranscoder;
pub use ffprobe::FfprobeProber;

// ============================================================================
// TRAITS
// ============================================================================

/// Runs the external encoder.
///
/// The argument list is complete, output path last. Implementations block
/// until the invocation finishes and return its combined output.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, args: &[String]) -> CoreResult<String>;
}

/// Reads media metadata.
pub trait Prober: Send + Sync {
    /// All streams of a file in container order.
    fn streams(&self, path: &Path) -> CoreResult<Vec<StreamDescriptor>>;

    /// Duration of the file in seconds, taken from the container.
    fn duration(&self, path: &Path) -> CoreResult<f64>;

    /// Number of packets in the first video stream.
    fn frame_count(&self, path: &Path) -> CoreResult<u64>;
}

/// The pair of tools a pipeline runs with.
#[derive(Clone, Copy)]
pub struct Toolset<'a> {
    pub transcoder: &'a dyn Transcoder,
    pub prober: &'a dyn Prober,
}

// ============================================================================
// DEPENDENCY CHECKING
// ============================================================================

/// Checks that an external command exists by running it with `-version`.
///
/// # Returns
///
/// * `Ok(())` - The command started
/// * `Err(CoreError::DependencyNotFound)` - The command is not on the PATH
/// * `Err(CoreError::CommandStart)` - The command exists but failed to start
pub fn check_dependency(cmd_name: &str) -> CoreResult<()> {
    let result = Command::new(cmd_name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(_) => {
            log::debug!("Found dependency: {}", cmd_name);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Dependency '{}' not found.", cmd_name);
            Err(CoreError::DependencyNotFound(cmd_name.to_string()))
        }
        Err(e) => {
            log::error!("Failed to start dependency check command '{}': {}", cmd_name, e);
            Err(CoreError::CommandStart(cmd_name.to_string(), e))
        }
    }
}
