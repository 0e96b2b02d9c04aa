// ============================================================================
// fleetcode-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: Console and File Logging for the CLI
//
// Console-only runs use `env_logger`; the level comes from `--log-level`
// and RUST_LOG overrides it. With `--log-file` the core's log4rs setup
// writes to both the console and the file.

use log::LevelFilter;
use std::error::Error;
use std::path::{Path, PathBuf};

use fleetcode_core::file_logging::{default_log_file_name, setup_file_logging};

/// Current local time as "YYYY-MM-DD HH:MM:SS".
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Resolves `--log-file`: a directory gets a timestamped file inside it.
pub fn resolve_log_path(log_file: &Path, role: &str, hostname: &str) -> PathBuf {
    if log_file.is_dir() {
        log_file.join(default_log_file_name(role, hostname))
    } else {
        log_file.to_path_buf()
    }
}

/// Installs the global logger. Call once, before any command runs.
pub fn init_logging(
    level: LevelFilter,
    log_file: Option<&Path>,
    role: &str,
    hostname: &str,
) -> Result<(), Box<dyn Error>> {
    match log_file {
        Some(log_file) => {
            let path = resolve_log_path(log_file, role, hostname);
            setup_file_logging(&path, level)?;
            log::debug!("Logging to {}", path.display());
        }
        None => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .format_timestamp_secs()
                .try_init()?;
        }
    }
    Ok(())
}
