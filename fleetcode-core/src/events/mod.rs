//! Lifecycle events of the dispatcher and the worker.
//!
//! Components emit [`Event`]s through an [`EventDispatcher`]; handlers
//! decide where they go. [`LogEventHandler`] writes them to the `log`
//! facade, [`JsonEventHandler`] writes one JSON object per line.

use std::sync::Arc;
use std::time::Duration;

pub mod json_handler;

pub use json_handler::JsonEventHandler;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Discovery events
    DiscoveryStarted {
        root: String,
    },
    DiscoveryComplete {
        queued: usize,
    },

    // Dispatcher events, one per handled request
    JobAssigned {
        path: String,
        hostname: String,
        pid: String,
    },
    NoJobAvailable {
        hostname: String,
        pid: String,
    },
    JobDone {
        path: String,
        hostname: String,
        pid: String,
        elapsed: Option<String>,
    },
    JobFailed {
        path: String,
        hostname: String,
        pid: String,
        elapsed: Option<String>,
        error: Option<String>,
    },
    JobSkipped {
        path: String,
        hostname: String,
        pid: String,
        elapsed: Option<String>,
    },
    JobKilled {
        path: String,
        hostname: String,
        pid: String,
    },
    JobRequeued {
        path: String,
        attempt: u32,
    },
    UnknownRequest {
        req: String,
        hostname: String,
        pid: String,
    },

    // Worker events
    WorkerJobStarted {
        path: String,
    },
    WorkerJobFinished {
        path: String,
        outcome: String,
        elapsed: Duration,
    },
    KilledReportSent {
        path: String,
    },
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

#[derive(Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// A dispatcher with a [`LogEventHandler`] already attached.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.add_handler(Arc::new(LogEventHandler));
        dispatcher
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: Event) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes events to the `log` facade.
///
/// Successful steps log at info, anything an operator may want to look at
/// (no job, failure, skip, kill) at warn.
pub struct LogEventHandler;

impl EventHandler for LogEventHandler {
    fn handle(&self, event: &Event) {
        let elapsed = |e: &Option<String>| e.clone().unwrap_or_else(|| "-".to_string());
        match event {
            Event::DiscoveryStarted { root } => log::info!("Discovering files under {}", root),
            Event::DiscoveryComplete { queued } => {
                log::info!("Discovery complete, {} files queued", queued)
            }
            Event::JobAssigned {
                path,
                hostname,
                pid,
            } => log::info!("Start [{}:{}] {}", hostname, pid, path),
            Event::NoJobAvailable { hostname, pid } => {
                log::warn!("Got job request from {}:{}, but no more job", hostname, pid)
            }
            Event::JobDone {
                path,
                hostname,
                pid,
                elapsed: e,
            } => log::info!("Complete [{}:{}] {} ({}s)", hostname, pid, path, elapsed(e)),
            Event::JobFailed {
                path,
                hostname,
                pid,
                elapsed: e,
                error,
            } => log::warn!(
                "Failed [{}:{}] {} ({}s): {}",
                hostname,
                pid,
                path,
                elapsed(e),
                error.as_deref().unwrap_or("unknown error")
            ),
            Event::JobSkipped {
                path,
                hostname,
                pid,
                elapsed: e,
            } => log::warn!("Skipped [{}:{}] {} ({}s)", hostname, pid, path, elapsed(e)),
            Event::JobKilled {
                path,
                hostname,
                pid,
            } => log::warn!("Incomplete [{}:{}] {}", hostname, pid, path),
            Event::JobRequeued { path, attempt } => {
                log::info!("Requeued {} (attempt {})", path, attempt)
            }
            Event::UnknownRequest { req, hostname, pid } => {
                log::debug!("Unknown request {:?} from {}:{}", req, hostname, pid)
            }
            Event::WorkerJobStarted { path } => log::info!("Processing {}", path),
            Event::WorkerJobFinished {
                path,
                outcome,
                elapsed,
            } => log::info!(
                "{} {} in {:.3}s",
                outcome,
                path,
                elapsed.as_secs_f64()
            ),
            Event::KilledReportSent { path } => {
                log::warn!("Reported {} as killed", path)
            }
        }
    }
}
