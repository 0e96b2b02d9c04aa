//! Core library for distributing media transcodes over a fleet of workers.
//!
//! A master process walks a directory tree and hands file paths to workers
//! over a small line-delimited JSON protocol. Each worker classifies the
//! file, picks its audio stream, and runs the matching pipeline: single
//! encodes for images, audio and video-only files, and split / parallel
//! encode / concat / mux for files with both video and audio. The finished
//! output replaces the original atomically.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use fleetcode_core::config::{DispatcherConfig, Policy, WorkerConfigBuilder};
//! use fleetcode_core::events::EventDispatcher;
//! use fleetcode_core::system_info::SystemIdentity;
//! use std::path::PathBuf;
//!
//! // On the master host
//! let config = DispatcherConfig::new(PathBuf::from("/srv/media"));
//! fleetcode_core::run_master(&config, SystemIdentity::collect(), EventDispatcher::with_logging())?;
//!
//! // On each worker host
//! let worker = WorkerConfigBuilder::new()
//!     .policy(Policy::from_file("config.json".as_ref())?)
//!     .temp_dir(PathBuf::from("/tmp/fleetcode"))
//!     .build()?;
//! fleetcode_core::run_worker("master:5000", worker, SystemIdentity::collect(), EventDispatcher::with_logging())?;
//! # Ok::<(), fleetcode_core::CoreError>(())
//! ```

pub mod attributes;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod external;
pub mod file_logging;
pub mod media;
pub mod pipeline;
pub mod protocol;
pub mod selection;
pub mod system_info;
pub mod temp_files;
pub mod worker;

// Re-exports for public API
pub use attributes::{AttrValue, flatten};
pub use config::{DispatcherConfig, MediaKind, Policy, WorkerConfig, WorkerConfigBuilder};
pub use dispatcher::{DispatchSummary, Dispatcher, run_master};
pub use error::{CoreError, CoreResult};
pub use events::{Event, EventDispatcher, EventHandler};
pub use media::{Category, TranscodeContext};
pub use selection::{is_skippable, select_audio_stream};
pub use system_info::SystemIdentity;
pub use worker::{JobOutcome, JobRunner, TranscodeRunner, Worker, WorkerClient, WorkerSummary, run_worker};
