// fleetcode-cli/src/lib.rs
//
// Library portion of the Fleetcode CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod logging;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, InspectArgs, MasterArgs, WorkerArgs};
pub use commands::inspect::run_inspect;
pub use commands::master::run_master_command;
pub use commands::worker::run_worker_command;
