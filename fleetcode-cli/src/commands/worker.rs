// fleetcode-cli/src/commands/worker.rs
//
// The `worker` command: load the transcode policy, check the external
// tools, connect to the master and process jobs until it runs out.

use std::path::PathBuf;

use fleetcode_core::config::{Policy, WorkerConfig, WorkerConfigBuilder};
use fleetcode_core::events::EventDispatcher;
use fleetcode_core::external::check_dependency;
use fleetcode_core::system_info::SystemIdentity;
use fleetcode_core::{CoreResult, WorkerSummary, run_worker};

use crate::cli::WorkerArgs;

/// `~/.temp`, or a directory under the system temp dir without a home.
pub fn default_temp_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".temp"),
        _ => std::env::temp_dir().join("fleetcode"),
    }
}

/// Builds the worker configuration from the command-line arguments.
pub fn worker_config(args: &WorkerArgs) -> CoreResult<WorkerConfig> {
    let policy = Policy::from_file(&args.conf)?;
    WorkerConfigBuilder::new()
        .policy(policy)
        .temp_dir(args.temp.clone().unwrap_or_else(default_temp_dir))
        .worker_fraction(args.worker_fraction)
        .min_segment_secs(args.min_segment_secs)
        .keep_backup(!args.remove_backup)
        .validate_duration(!args.no_validate_duration)
        .ffmpeg_path(args.ffmpeg.as_str())
        .ffprobe_path(args.ffprobe.as_str())
        .build()
}

pub fn run_worker_command(args: WorkerArgs, identity: SystemIdentity) -> CoreResult<WorkerSummary> {
    let config = worker_config(&args)?;
    check_dependency(&config.ffmpeg_path)?;
    check_dependency(&config.ffprobe_path)?;

    let addr = format!("{}:{}", args.ip, args.port);
    let summary = run_worker(&addr, config, identity, EventDispatcher::with_logging())?;
    log::info!(
        "Worker finished: {} done, {} skipped, {} failed",
        summary.done,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;

    #[test]
    fn test_worker_config_from_args() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let conf = dir.path().join("config.json");
        fs::write(
            &conf,
            r#"{"image":{"target_ext":"webp"},"audio":{"target_ext":"ogg"},"video":{"target_ext":".webm"}}"#,
        )?;
        let temp = dir.path().join("work");

        let cli = Cli::parse_from(vec![
            "fleetcode".to_string(),
            "worker".to_string(),
            "--conf".to_string(),
            conf.to_string_lossy().into_owned(),
            "--temp".to_string(),
            temp.to_string_lossy().into_owned(),
            "--remove-backup".to_string(),
        ]);
        let Commands::Worker(args) = cli.command else {
            panic!("expected worker");
        };

        let config = worker_config(&args)?;
        assert_eq!(config.temp_dir, temp);
        assert!(!config.keep_backup);
        assert!(config.validate_duration);
        assert_eq!(config.min_segment_secs, 16);
        Ok(())
    }

    #[test]
    fn test_missing_policy_file_is_config_error() {
        let cli = Cli::parse_from(["fleetcode", "worker", "--conf", "/nonexistent/config.json"]);
        let Commands::Worker(args) = cli.command else {
            panic!("expected worker");
        };
        let err = worker_config(&args).unwrap_err();
        assert!(matches!(err, fleetcode_core::CoreError::Config(_)));
    }
}
