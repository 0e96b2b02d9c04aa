// fleetcode-cli/src/commands/master.rs
//
// The `master` command: discover files under a root and serve them to
// workers until stopped (or until everything is finished with
// `--exit-when-done`).

use std::sync::Arc;

use fleetcode_core::config::DispatcherConfig;
use fleetcode_core::events::{EventDispatcher, JsonEventHandler};
use fleetcode_core::system_info::SystemIdentity;
use fleetcode_core::{CoreResult, DispatchSummary, run_master};

use crate::cli::MasterArgs;

/// Builds the dispatcher configuration from the command-line arguments.
pub fn dispatcher_config(args: &MasterArgs) -> DispatcherConfig {
    let mut config = DispatcherConfig::new(args.dir.clone());
    config.bind_addr = format!("{}:{}", args.bind, args.port);
    config.queue_capacity = args.queue_capacity;
    config
        .excluded_extensions
        .extend(args.exclude_ext.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()));
    config.requeue_killed = !args.no_requeue;
    config.max_requeues = args.max_requeues;
    config.exit_when_done = args.exit_when_done;
    config
}

pub fn run_master_command(args: MasterArgs, identity: SystemIdentity) -> CoreResult<DispatchSummary> {
    let config = dispatcher_config(&args);

    let mut events = EventDispatcher::with_logging();
    if args.json_events {
        events.add_handler(Arc::new(JsonEventHandler::new()));
    }

    let summary = run_master(&config, identity, events)?;
    log::info!(
        "Dispatched {} jobs: {} done, {} failed, {} skipped, {} killed ({} requeued)",
        summary.assigned,
        summary.done,
        summary.failed,
        summary.skipped,
        summary.killed,
        summary.requeued
    );
    Ok(summary)
}
