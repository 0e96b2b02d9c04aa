//! Subprocess execution for the external tools.

use std::process::Command;

use crate::error::{CoreResult, command_failed_error, command_start_error};

/// Captured output of a finished subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, the way a terminal would show them.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !out.is_empty() && !self.stderr.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

/// Runs `program` with `args` to completion.
///
/// A spawn failure becomes `CoreError::CommandStart`, a non-zero exit
/// becomes `CoreError::CommandFailed` carrying the combined output.
pub fn run_command(program: &str, args: &[String]) -> CoreResult<CommandOutput> {
    log::debug!("Running: {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| command_start_error(program, e))?;

    let captured = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    log::trace!("{} output:\n{}", program, captured.combined());

    if !output.status.success() {
        return Err(command_failed_error(
            program,
            output.status,
            captured.combined(),
        ));
    }

    Ok(captured)
}
