//! Log file setup for long-running master and worker processes.
//!
//! Console-only runs use whatever logger the binary installs; when a log
//! file is requested, [`setup_file_logging`] installs a `log4rs` logger that
//! writes to both the console and the file.

pub mod setup;

pub use setup::{default_log_file_name, setup_file_logging};
