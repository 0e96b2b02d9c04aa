// ============================================================================
// fleetcode-core/src/dispatcher/mod.rs
// ============================================================================
//
// MASTER DISPATCHER: Job Queue and Request Handling
//
// The dispatcher owns the queue filled by discovery and answers one worker
// request at a time. It tracks the state of every path it has handed out.
//
//   job_want  -> pop a path (requeued paths first) or answer res=false
//   job_done  -> Done        job_fail -> Failed      job_skip -> Skipped
//   killed    -> Killed, and back to the queue while requeues remain
//
// Outcome reports only apply to a path in the Assigned state; anything
// else is logged as stale and acknowledged without a state change. A
// worker holds at most one assignment: a job_want from a worker whose
// previous path is still Assigned gets that same path again, since the
// earlier reply never reached it.
//
// A job_want that finds the queue empty waits for discovery: res=false is
// only sent once the walk has finished and nothing is left to hand out.
//
// KEY COMPONENTS:
// - Dispatcher: request handling and job table
// - discovery: directory walk feeding the queue
// - server: TCP endpoint funnelling requests into one serving loop

// ---- External crate imports ----
use crossbeam_channel::Receiver;

// ---- Standard library imports ----
use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::path::PathBuf;

// ---- Internal crate imports ----
use crate::config::DispatcherConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventDispatcher};
use crate::protocol::{Request, RequestKind, Response};
use crate::system_info::SystemIdentity;

// ============================================================================
// SUBMODULES
// ============================================================================

pub mod discovery;
pub mod server;

pub use discovery::{Discovery, is_eligible, spawn_discovery};
pub use server::{ServerHandle, serve, spawn_server};

/// Lifecycle of a path known to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Assigned,
    Done,
    Failed,
    Skipped,
    Killed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Done | JobState::Failed | JobState::Skipped | JobState::Killed
        )
    }
}

#[derive(Debug, Clone)]
struct JobRecord {
    state: JobState,
    requeues: u32,
}

/// Counts of job outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub assigned: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
    pub killed: usize,
    pub requeued: usize,
    pub in_flight: usize,
}

/// Answers worker requests against the discovery queue.
pub struct Dispatcher {
    identity: SystemIdentity,
    discovery: Discovery,
    retry: VecDeque<String>,
    jobs: HashMap<String, JobRecord>,
    assignments: HashMap<(String, String), String>,
    requeue_killed: bool,
    max_requeues: u32,
    events: EventDispatcher,
    summary: DispatchSummary,
}

impl Dispatcher {
    pub fn new(
        discovery: Discovery,
        config: &DispatcherConfig,
        identity: SystemIdentity,
        events: EventDispatcher,
    ) -> Self {
        Self {
            identity,
            discovery,
            retry: VecDeque::new(),
            jobs: HashMap::new(),
            assignments: HashMap::new(),
            requeue_killed: config.requeue_killed,
            max_requeues: config.max_requeues,
            events,
            summary: DispatchSummary::default(),
        }
    }

    pub fn identity(&self) -> &SystemIdentity {
        &self.identity
    }

    /// Handles one request and builds its reply.
    pub fn handle(&mut self, request: &Request) -> Response {
        let path = request.path.clone().unwrap_or_default();
        let hostname = request.hostname.clone();
        let pid = request.pid.clone();

        let worker = (hostname.clone(), pid.clone());

        if request.req == RequestKind::JobWant {
            if let Some(held) = self.current_assignment(&worker) {
                log::warn!(
                    "{}:{} asked again while holding {}, resending it",
                    hostname,
                    pid,
                    held
                );
                return Response::job(&self.identity, held);
            }
        }

        match request.req {
            RequestKind::JobWant => match self.next_job() {
                Some(path) => {
                    self.set_state(&path, JobState::Assigned);
                    self.assignments.insert(worker, path.clone());
                    self.summary.assigned += 1;
                    self.events.emit(Event::JobAssigned {
                        path: path.clone(),
                        hostname,
                        pid,
                    });
                    return Response::job(&self.identity, path);
                }
                None => {
                    self.events.emit(Event::NoJobAvailable { hostname, pid });
                    return Response::no_job(&self.identity);
                }
            },
            RequestKind::JobDone | RequestKind::JobFail | RequestKind::JobSkip | RequestKind::Killed
                if self.state_of(&path) != Some(JobState::Assigned) =>
            {
                log::warn!(
                    "Ignoring stale {} for {:?} from {}:{} (state {:?})",
                    request.req.as_str(),
                    path,
                    hostname,
                    pid,
                    self.state_of(&path)
                );
            }
            RequestKind::JobDone => {
                self.release(&path);
                self.set_state(&path, JobState::Done);
                self.summary.done += 1;
                self.events.emit(Event::JobDone {
                    path,
                    hostname,
                    pid,
                    elapsed: request.elapsed_time.clone(),
                });
            }
            RequestKind::JobFail => {
                self.release(&path);
                self.set_state(&path, JobState::Failed);
                self.summary.failed += 1;
                self.events.emit(Event::JobFailed {
                    path,
                    hostname,
                    pid,
                    elapsed: request.elapsed_time.clone(),
                    error: request.error.clone(),
                });
            }
            RequestKind::JobSkip => {
                self.release(&path);
                self.set_state(&path, JobState::Skipped);
                self.summary.skipped += 1;
                self.events.emit(Event::JobSkipped {
                    path,
                    hostname,
                    pid,
                    elapsed: request.elapsed_time.clone(),
                });
            }
            RequestKind::Killed => {
                self.release(&path);
                self.set_state(&path, JobState::Killed);
                self.summary.killed += 1;
                self.events.emit(Event::JobKilled {
                    path: path.clone(),
                    hostname,
                    pid,
                });
                self.maybe_requeue(path);
            }
            RequestKind::Unknown => {
                self.events.emit(Event::UnknownRequest {
                    req: request.req.as_str().to_string(),
                    hostname,
                    pid,
                });
            }
        }

        Response::ack(&self.identity)
    }

    /// Next path to hand out: requeued paths first, then the discovery
    /// queue. Waits for discovery while the queue is empty; `None` once
    /// discovery has finished and everything has been handed out.
    fn next_job(&mut self) -> Option<String> {
        if let Some(path) = self.retry.pop_front() {
            return Some(path);
        }
        let receiver: &Receiver<PathBuf> = &self.discovery.receiver;
        receiver
            .recv()
            .ok()
            .map(|path| path.to_string_lossy().into_owned())
    }

    /// Path still assigned to `worker`, if any.
    fn current_assignment(&self, worker: &(String, String)) -> Option<String> {
        self.assignments
            .get(worker)
            .filter(|path| self.state_of(path) == Some(JobState::Assigned))
            .cloned()
    }

    /// Drops whichever worker assignment holds `path`.
    fn release(&mut self, path: &str) {
        self.assignments.retain(|_, assigned| assigned != path);
    }

    fn set_state(&mut self, path: &str, state: JobState) {
        if path.is_empty() {
            return;
        }
        self.jobs
            .entry(path.to_string())
            .and_modify(|record| record.state = state)
            .or_insert(JobRecord { state, requeues: 0 });
    }

    fn maybe_requeue(&mut self, path: String) {
        if !self.requeue_killed || path.is_empty() {
            return;
        }
        let Some(record) = self.jobs.get_mut(&path) else {
            return;
        };
        if record.requeues >= self.max_requeues {
            log::warn!(
                "{} was killed {} times, not requeueing",
                path,
                record.requeues + 1
            );
            return;
        }
        record.requeues += 1;
        record.state = JobState::Queued;
        let attempt = record.requeues;
        self.summary.requeued += 1;
        self.retry.push_back(path.clone());
        self.events.emit(Event::JobRequeued { path, attempt });
    }

    /// State of a path, if the dispatcher has seen it.
    pub fn state_of(&self, path: &str) -> Option<JobState> {
        self.jobs.get(path).map(|record| record.state)
    }

    /// True when discovery has finished, the queues are empty and no
    /// job is assigned.
    pub fn is_finished(&self) -> bool {
        self.discovery.is_done()
            && self.discovery.receiver.is_empty()
            && self.retry.is_empty()
            && self.jobs.values().all(|record| record.state.is_terminal())
    }

    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            in_flight: self
                .jobs
                .values()
                .filter(|record| record.state == JobState::Assigned)
                .count(),
            ..self.summary.clone()
        }
    }
}

/// Binds the endpoint, starts discovery and serves until done.
///
/// Serves forever unless `config.exit_when_done` is set.
pub fn run_master(
    config: &DispatcherConfig,
    identity: SystemIdentity,
    events: EventDispatcher,
) -> CoreResult<DispatchSummary> {
    config.validate()?;

    let listener = TcpListener::bind(&config.bind_addr)
        .map_err(|e| CoreError::Network(format!("cannot bind {}: {}", config.bind_addr, e)))?;
    log::info!(
        "Master {}:{} listening on {}",
        identity.hostname,
        identity.pid,
        config.bind_addr
    );

    let discovery = spawn_discovery(
        &config.root,
        &config.excluded_extensions,
        config.queue_capacity,
        events.clone(),
    )?;
    let dispatcher = Dispatcher::new(discovery, config, identity, events);
    serve(listener, dispatcher, config.exit_when_done)
}
