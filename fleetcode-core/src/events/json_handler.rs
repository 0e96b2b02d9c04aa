//! JSON event handler for structured output
//!
//! Writes every event as one JSON object per line, for consumption by
//! external tools that follow a master's progress.

use super::{Event, EventHandler};
use serde_json::json;
use std::io::{self, Write};
use std::sync::Mutex;

/// Event handler that outputs events as structured JSON lines
pub struct JsonEventHandler {
    output: Mutex<Box<dyn Write + Send>>,
}

impl JsonEventHandler {
    /// Create a new JSON event handler that writes to stdout
    pub fn new() -> Self {
        Self {
            output: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a new JSON event handler with a custom writer
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            output: Mutex::new(writer),
        }
    }

    fn write_json(&self, mut value: serde_json::Value) {
        value["timestamp"] = json!(chrono::Utc::now().to_rfc3339());
        if let Ok(mut output) = self.output.lock() {
            if let Ok(json_str) = serde_json::to_string(&value) {
                let _ = writeln!(output, "{}", json_str);
                let _ = output.flush();
            }
        }
    }
}

impl Default for JsonEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for JsonEventHandler {
    fn handle(&self, event: &Event) {
        let value = match event {
            Event::DiscoveryStarted { root } => json!({ "type": "discovery_started", "root": root }),
            Event::DiscoveryComplete { queued } => {
                json!({ "type": "discovery_complete", "queued": queued })
            }
            Event::JobAssigned {
                path,
                hostname,
                pid,
            } => json!({ "type": "job_assigned", "path": path, "hostname": hostname, "pid": pid }),
            Event::NoJobAvailable { hostname, pid } => {
                json!({ "type": "no_job", "hostname": hostname, "pid": pid })
            }
            Event::JobDone {
                path,
                hostname,
                pid,
                elapsed,
            } => json!({
                "type": "job_done",
                "path": path,
                "hostname": hostname,
                "pid": pid,
                "elapsed_time": elapsed
            }),
            Event::JobFailed {
                path,
                hostname,
                pid,
                elapsed,
                error,
            } => json!({
                "type": "job_fail",
                "path": path,
                "hostname": hostname,
                "pid": pid,
                "elapsed_time": elapsed,
                "error": error
            }),
            Event::JobSkipped {
                path,
                hostname,
                pid,
                elapsed,
            } => json!({
                "type": "job_skip",
                "path": path,
                "hostname": hostname,
                "pid": pid,
                "elapsed_time": elapsed
            }),
            Event::JobKilled {
                path,
                hostname,
                pid,
            } => json!({ "type": "killed", "path": path, "hostname": hostname, "pid": pid }),
            Event::JobRequeued { path, attempt } => {
                json!({ "type": "job_requeued", "path": path, "attempt": attempt })
            }
            Event::UnknownRequest { req, hostname, pid } => {
                json!({ "type": "unknown_request", "req": req, "hostname": hostname, "pid": pid })
            }
            Event::WorkerJobStarted { path } => json!({ "type": "worker_job_started", "path": path }),
            Event::WorkerJobFinished {
                path,
                outcome,
                elapsed,
            } => json!({
                "type": "worker_job_finished",
                "path": path,
                "outcome": outcome,
                "elapsed_secs": elapsed.as_secs_f64()
            }),
            Event::KilledReportSent { path } => {
                json!({ "type": "killed_report_sent", "path": path })
            }
        };
        self.write_json(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_one_line_per_event() {
        let buf = SharedBuf::default();
        let handler = JsonEventHandler::with_writer(Box::new(buf.clone()));
        handler.handle(&Event::JobKilled {
            path: "/m/a.mkv".into(),
            hostname: "h".into(),
            pid: "1".into(),
        });
        handler.handle(&Event::DiscoveryComplete { queued: 2 });

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "killed");
        assert_eq!(lines[0]["path"], "/m/a.mkv");
        assert!(lines[1]["timestamp"].is_string());
    }
}
