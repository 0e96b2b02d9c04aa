// fleetcode-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

use fleetcode_core::config::{
    DEFAULT_FFMPEG, DEFAULT_FFPROBE, DEFAULT_MAX_REQUEUES, DEFAULT_MIN_SEGMENT_SECS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_FRACTION,
};

/// Port shared by `master --port` and `worker --port`.
pub const DEFAULT_PORT: u16 = 5000;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Fleetcode: distributed media transcoding",
    long_about = "Runs the master dispatcher that hands out media files, or a worker that transcodes them with ffmpeg."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (error, warn, info, debug, trace). RUST_LOG overrides it for console logging.
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    pub log_level: LevelFilter,

    /// Also write the log to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walks a directory and hands its files out to workers
    Master(MasterArgs),
    /// Requests files from a master and transcodes them
    Worker(WorkerArgs),
    /// Classifies one file and shows what a worker would do with it
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct MasterArgs {
    /// Root directory to transcode
    #[arg(short, long, value_name = "DIR")]
    pub dir: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0", value_name = "ADDR")]
    pub bind: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of discovered paths buffered ahead of the workers
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_name = "N")]
    pub queue_capacity: usize,

    /// Additional extension to exclude (repeatable)
    #[arg(long = "exclude-ext", value_name = "EXT")]
    pub exclude_ext: Vec<String>,

    /// Log killed jobs without handing them out again
    #[arg(long)]
    pub no_requeue: bool,

    /// How many times a killed path is handed out again
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEUES, value_name = "N")]
    pub max_requeues: u32,

    /// Stop once every discovered file is finished
    #[arg(long)]
    pub exit_when_done: bool,

    /// Write lifecycle events to stdout as JSON lines
    #[arg(long)]
    pub json_events: bool,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Master address
    #[arg(long, default_value = "localhost", value_name = "HOST")]
    pub ip: String,

    /// Master port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Transcode policy (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub conf: PathBuf,

    /// Directory for intermediate files (defaults to ~/.temp)
    #[arg(short, long, value_name = "DIR")]
    pub temp: Option<PathBuf>,

    /// Share of logical CPUs used for parallel segment encodes
    #[arg(long, default_value_t = DEFAULT_WORKER_FRACTION, value_name = "FRACTION")]
    pub worker_fraction: f64,

    /// Shortest segment length in seconds
    #[arg(long = "min-segment", default_value_t = DEFAULT_MIN_SEGMENT_SECS, value_name = "SECONDS")]
    pub min_segment_secs: u64,

    /// Delete the original after a successful swap instead of keeping a hidden backup
    #[arg(long)]
    pub remove_backup: bool,

    /// Skip the duration comparison between source and output
    #[arg(long)]
    pub no_validate_duration: bool,

    /// ffmpeg executable
    #[arg(long, default_value = DEFAULT_FFMPEG, value_name = "PATH")]
    pub ffmpeg: String,

    /// ffprobe executable
    #[arg(long, default_value = DEFAULT_FFPROBE, value_name = "PATH")]
    pub ffprobe: String,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// File to classify
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Transcode policy (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub conf: PathBuf,

    /// ffprobe executable
    #[arg(long, default_value = DEFAULT_FFPROBE, value_name = "PATH")]
    pub ffprobe: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_master_defaults() {
        let cli = Cli::parse_from(["fleetcode", "master", "--dir", "/srv/media"]);
        assert_eq!(cli.log_level, LevelFilter::Info);
        match cli.command {
            Commands::Master(args) => {
                assert_eq!(args.dir, PathBuf::from("/srv/media"));
                assert_eq!(args.bind, "0.0.0.0");
                assert_eq!(args.port, 5000);
                assert_eq!(args.queue_capacity, 16);
                assert_eq!(args.max_requeues, 2);
                assert!(!args.no_requeue);
                assert!(!args.exit_when_done);
            }
            other => panic!("expected master, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_worker_args() {
        let cli = Cli::parse_from([
            "fleetcode",
            "--log-level",
            "debug",
            "worker",
            "--ip",
            "10.0.0.2",
            "--conf",
            "config.json",
            "--worker-fraction",
            "0.5",
            "--min-segment",
            "30",
            "--remove-backup",
        ]);
        assert_eq!(cli.log_level, LevelFilter::Debug);
        match cli.command {
            Commands::Worker(args) => {
                assert_eq!(args.ip, "10.0.0.2");
                assert_eq!(args.port, 5000);
                assert_eq!(args.conf, PathBuf::from("config.json"));
                assert!(args.temp.is_none());
                assert_eq!(args.worker_fraction, 0.5);
                assert_eq!(args.min_segment_secs, 30);
                assert!(args.remove_backup);
                assert!(!args.no_validate_duration);
            }
            other => panic!("expected worker, got {other:?}"),
        }
    }

    #[test]
    fn test_exclude_ext_repeats() {
        let cli = Cli::parse_from([
            "fleetcode",
            "master",
            "-d",
            "media",
            "--exclude-ext",
            "iso",
            "--exclude-ext",
            "nfo",
        ]);
        match cli.command {
            Commands::Master(args) => assert_eq!(args.exclude_ext, vec!["iso", "nfo"]),
            other => panic!("expected master, got {other:?}"),
        }
    }
}
