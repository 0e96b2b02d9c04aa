// ============================================================================
// fleetcode-core/src/worker.rs
// ============================================================================
//
// WORKER CLIENT: Job Loop on a Worker Host
//
// A worker asks the master for a path, runs the transcode pipeline on it,
// reports the outcome and asks again, until the master answers that there
// is no more work.
//
// KEY COMPONENTS:
// - WorkerClient: protocol requests for one worker identity
// - JobRunner: what "processing a path" means (TranscodeRunner in production)
// - Worker: the loop, panic isolation per job, and the killed report
//
// FAILURE HANDLING:
// - A panic inside one job is caught and reported as job_fail.
// - A failed report is logged; the loop continues with the next request.
// - If the Worker is dropped while a job is in flight (including while a
//   panic unwinds through the loop) it sends `killed` with that path.

// ---- Standard library imports ----
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// ---- Internal crate imports ----
use crate::config::WorkerConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventDispatcher};
use crate::external::{FfmpegTranscoder, FfprobeProber, Prober, Toolset, Transcoder};
use crate::media::TranscodeContext;
use crate::pipeline::{self, PipelineSettings};
use crate::protocol::{Connection, Request, RequestKind};
use crate::system_info::SystemIdentity;

/// Result of processing one path.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Transcoded; carries the replacement path when there is one
    Done(Option<PathBuf>),
    /// Nothing to do for this file
    Skipped(String),
    /// Failed with a description
    Failed(String),
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Done(_) => "Done",
            JobOutcome::Skipped(_) => "Skipped",
            JobOutcome::Failed(_) => "Failed",
        }
    }
}

/// Processes one path.
pub trait JobRunner {
    fn run(&self, path: &Path) -> JobOutcome;
}

/// Production runner: classify, then run the matching pipeline.
pub struct TranscodeRunner {
    config: WorkerConfig,
    settings: PipelineSettings,
    transcoder: Box<dyn Transcoder>,
    prober: Box<dyn Prober>,
}

impl TranscodeRunner {
    pub fn new(
        config: WorkerConfig,
        transcoder: Box<dyn Transcoder>,
        prober: Box<dyn Prober>,
    ) -> Self {
        let settings = PipelineSettings::from(&config);
        Self {
            config,
            settings,
            transcoder,
            prober,
        }
    }

    /// Runner backed by the ffmpeg and ffprobe executables from `config`.
    pub fn from_config(config: WorkerConfig) -> Self {
        let transcoder = Box::new(FfmpegTranscoder::new(config.ffmpeg_path.clone()));
        let prober = Box::new(FfprobeProber::new(config.ffprobe_path.clone()));
        Self::new(config, transcoder, prober)
    }

    fn process(&self, path: &Path) -> CoreResult<JobOutcome> {
        let ctx = TranscodeContext::build(
            path,
            &self.config.policy,
            &self.config.temp_dir,
            self.prober.as_ref(),
        )?;
        if ctx.category.is_skipped() {
            return Ok(JobOutcome::Skipped(format!("category {}", ctx.category)));
        }

        let tools = Toolset {
            transcoder: self.transcoder.as_ref(),
            prober: self.prober.as_ref(),
        };
        Ok(match pipeline::transcode(&ctx, tools, &self.settings)? {
            Some(output) => JobOutcome::Done(Some(output)),
            None => JobOutcome::Skipped(format!("category {}", ctx.category)),
        })
    }
}

impl JobRunner for TranscodeRunner {
    fn run(&self, path: &Path) -> JobOutcome {
        match self.process(path) {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed(format!("{}: {}", e.stage(), e)),
        }
    }
}

/// Protocol client for one worker identity.
pub struct WorkerClient {
    conn: Connection,
    identity: SystemIdentity,
}

impl WorkerClient {
    /// Connects to the master at `addr`.
    pub fn connect(addr: &str, identity: SystemIdentity) -> CoreResult<Self> {
        Ok(Self {
            conn: Connection::connect(addr)?,
            identity,
        })
    }

    pub fn identity(&self) -> &SystemIdentity {
        &self.identity
    }

    /// Sends `job_want`. `Ok(None)` means the master has no more work.
    pub fn request_job(&mut self) -> CoreResult<Option<String>> {
        let response = self
            .conn
            .request(&Request::new(RequestKind::JobWant, &self.identity))?;
        match response.res.as_deref() {
            Some("true") => response
                .path
                .map(Some)
                .ok_or_else(|| CoreError::Protocol("job_want reply without a path".to_string())),
            Some("false") => Ok(None),
            other => Err(CoreError::Protocol(format!(
                "unexpected job_want reply res={other:?}"
            ))),
        }
    }

    /// Reports the outcome of `path`.
    pub fn report(&mut self, path: &str, outcome: &JobOutcome, elapsed: Duration) -> CoreResult<()> {
        let request = match outcome {
            JobOutcome::Done(output) => {
                let request = Request::new(RequestKind::JobDone, &self.identity);
                match output {
                    Some(output) => request.with_output(output.to_string_lossy()),
                    None => request,
                }
            }
            JobOutcome::Skipped(_) => Request::new(RequestKind::JobSkip, &self.identity),
            JobOutcome::Failed(error) => {
                Request::new(RequestKind::JobFail, &self.identity).with_error(error.clone())
            }
        };
        self.conn
            .request(&request.with_path(path).with_elapsed(elapsed))?;
        Ok(())
    }

    /// Tells the master that `path` was abandoned.
    pub fn report_killed(&mut self, path: &str) -> CoreResult<()> {
        self.conn
            .request(&Request::new(RequestKind::Killed, &self.identity).with_path(path))?;
        Ok(())
    }
}

/// Counts of the jobs a worker finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The job loop.
pub struct Worker<R: JobRunner> {
    client: WorkerClient,
    runner: R,
    events: EventDispatcher,
    in_flight: Option<String>,
    summary: WorkerSummary,
}

impl<R: JobRunner> Worker<R> {
    pub fn new(client: WorkerClient, runner: R, events: EventDispatcher) -> Self {
        Self {
            client,
            runner,
            events,
            in_flight: None,
            summary: WorkerSummary::default(),
        }
    }

    /// Path currently being processed.
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Requests the next job and marks it in flight.
    ///
    /// A failed `job_want` is retried once on a fresh connection. If the
    /// master had already assigned a path, the retry gets that same path.
    pub fn claim(&mut self) -> CoreResult<Option<String>> {
        let path = match self.client.request_job() {
            Ok(path) => path,
            Err(e) => {
                log::warn!("job_want failed ({}), retrying", e);
                self.client.request_job()?
            }
        };
        self.in_flight = path.clone();
        Ok(path)
    }

    /// Processes jobs until the master runs out of work.
    pub fn run(&mut self) -> CoreResult<WorkerSummary> {
        while let Some(path) = self.claim()? {
            self.events.emit(Event::WorkerJobStarted { path: path.clone() });
            let start = Instant::now();

            let runner = &self.runner;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.run(Path::new(&path))))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    log::error!("Job {} panicked: {}", path, message);
                    JobOutcome::Failed(format!("panic: {message}"))
                });
            let elapsed = start.elapsed();

            match &outcome {
                JobOutcome::Done(_) => self.summary.done += 1,
                JobOutcome::Skipped(reason) => {
                    log::info!("Skipping {}: {}", path, reason);
                    self.summary.skipped += 1;
                }
                JobOutcome::Failed(error) => {
                    log::warn!("{} failed: {}", path, error);
                    self.summary.failed += 1;
                }
            }
            self.events.emit(Event::WorkerJobFinished {
                path: path.clone(),
                outcome: outcome.label().to_string(),
                elapsed,
            });

            // The job has finished either way; a lost report is not a kill.
            self.in_flight = None;
            if let Err(e) = self.client.report(&path, &outcome, elapsed) {
                log::error!("Could not report {} for {}: {}", outcome.label(), path, e);
            }
        }

        log::info!("No more jobs, worker exiting");
        Ok(self.summary.clone())
    }
}

impl<R: JobRunner> Drop for Worker<R> {
    fn drop(&mut self) {
        if let Some(path) = self.in_flight.take() {
            match self.client.report_killed(&path) {
                Ok(()) => self.events.emit(Event::KilledReportSent { path }),
                Err(e) => log::error!("Could not report {} as killed: {}", path, e),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Connects to the master at `addr` and runs the transcode loop.
pub fn run_worker(
    addr: &str,
    config: WorkerConfig,
    identity: SystemIdentity,
    events: EventDispatcher,
) -> CoreResult<WorkerSummary> {
    config.validate()?;
    std::fs::create_dir_all(&config.temp_dir)?;

    let client = WorkerClient::connect(addr, identity)?;
    log::info!(
        "Worker {}:{} connected to {} ({} segment encoders)",
        client.identity().hostname,
        client.identity().pid,
        addr,
        config.segment_workers()
    );

    let mut worker = Worker::new(client, TranscodeRunner::from_config(config), events);
    worker.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(JobOutcome::Done(None).label(), "Done");
        assert_eq!(JobOutcome::Skipped("x".into()).label(), "Skipped");
        assert_eq!(JobOutcome::Failed("x".into()).label(), "Failed");
    }
}
