// fleetcode-cli/src/main.rs
//
// Entry point of the `fleetcode` binary: parse arguments, set up logging,
// run the selected command and map its result to an exit code.

use clap::Parser;
use std::process;

use fleetcode_cli::logging::{get_timestamp, init_logging};
use fleetcode_cli::{Cli, Commands, run_inspect, run_master_command, run_worker_command};
use fleetcode_core::SystemIdentity;

fn main() {
    let cli = Cli::parse();
    let identity = SystemIdentity::collect();

    let role = match &cli.command {
        Commands::Master(_) => "master",
        Commands::Worker(_) => "worker",
        Commands::Inspect(_) => "inspect",
    };
    if let Err(e) = init_logging(cli.log_level, cli.log_file.as_deref(), role, &identity.hostname) {
        eprintln!("Error: cannot set up logging: {}", e);
        process::exit(1);
    }

    log::debug!(
        "fleetcode {} starting on {}:{} at {}",
        role,
        identity.hostname,
        identity.pid,
        get_timestamp()
    );

    let logs_to_file = cli.log_file.is_some();
    let result = match cli.command {
        Commands::Master(args) => run_master_command(args, identity).map(|_| ()),
        Commands::Worker(args) => run_worker_command(args, identity).map(|_| ()),
        Commands::Inspect(args) => run_inspect(args).and_then(|report| {
            let text = serde_json::to_string_pretty(&report)?;
            println!("{}", text);
            Ok(())
        }),
    };

    if let Err(e) = result {
        if logs_to_file {
            log::error!("Error: {}", e);
        } else {
            eprintln!("Error: {}", e);
        }
        process::exit(1);
    }
}
