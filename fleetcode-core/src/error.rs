// ============================================================================
// fleetcode-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Error Types and Utilities
//
// This module defines the error type used throughout the fleetcode-core
// library. Each variant corresponds to one stage of a job (probe, encode,
// concat, mux, swap) or one boundary of the system (network, protocol,
// subprocesses, configuration).
//
// KEY COMPONENTS:
// - CoreError: Enum of all error kinds
// - CoreResult: Result alias used by every fallible operation
// - Helper functions for subprocess errors

// ---- External crate imports ----
use thiserror::Error;

// ---- Standard library imports ----
use std::io;
use std::process::ExitStatus;

/// Errors produced by the dispatcher, the worker and the transcode pipeline.
///
/// Classification skips are not errors: a file that should not be
/// transcoded is reported through [`crate::media::Category::Skip`] and
/// [`crate::media::Category::ImageAnimated`].
#[derive(Error, Debug)]
pub enum CoreError {
    // ---- Stage failures ----
    #[error("Probe failed for {path}: {message}")]
    Probe { path: String, message: String },

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Concat failed: {0}")]
    Concat(String),

    #[error("Mux failed: {0}")]
    Mux(String),

    #[error("Swap failed: {0}")]
    Swap(String),

    #[error("Output validation failed: {0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,

    // ---- Boundaries ----
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to execute {0}: {1}")]
    CommandStart(String, io::Error),

    #[error("Command {0} failed with status {1}. Output:\n{2}")]
    CommandFailed(String, ExitStatus, String),

    #[error("Required external command '{0}' not found")]
    DependencyNotFound(String),

    // ---- Conversions ----
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Short stage label used in logs and job_fail reports.
    pub fn stage(&self) -> &'static str {
        match self {
            CoreError::Probe { .. } => "probe",
            CoreError::Encode(_) => "encode",
            CoreError::Concat(_) => "concat",
            CoreError::Mux(_) => "mux",
            CoreError::Swap(_) => "swap",
            CoreError::Validation(_) => "validation",
            CoreError::Cancelled => "cancelled",
            CoreError::Network(_) => "network",
            CoreError::Protocol(_) => "protocol",
            CoreError::Config(_) => "config",
            CoreError::CommandStart(..)
            | CoreError::CommandFailed(..)
            | CoreError::DependencyNotFound(_) => "command",
            CoreError::Io(_) => "io",
            CoreError::Json(_) => "json",
        }
    }
}

/// Result type for fleetcode operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Wraps a spawn failure for the named command.
pub fn command_start_error(cmd: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::CommandStart(cmd.into(), err)
}

/// Wraps a non-zero exit of the named command together with its output.
pub fn command_failed_error(
    cmd: impl Into<String>,
    status: ExitStatus,
    output: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed(cmd.into(), status, output.into())
}
