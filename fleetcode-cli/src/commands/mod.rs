//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// Module containing the implementation of the `master` command.
pub mod master;

/// Module containing the implementation of the `worker` command.
pub mod worker;

/// Module containing the implementation of the `inspect` command.
pub mod inspect;
