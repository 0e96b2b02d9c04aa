use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::tempdir;

use fleetcode_core::config::DispatcherConfig;
use fleetcode_core::dispatcher::{
    Discovery, Dispatcher, JobState, ServerHandle, spawn_discovery, spawn_server,
};
use fleetcode_core::events::{Event, EventDispatcher, EventHandler};
use fleetcode_core::protocol::{Request, RequestKind};
use fleetcode_core::system_info::SystemIdentity;
use fleetcode_core::worker::{JobOutcome, JobRunner, Worker, WorkerClient};

#[derive(Default)]
struct Collect(Mutex<Vec<Event>>);

impl EventHandler for Collect {
    fn handle(&self, event: &Event) {
        self.0.lock().unwrap().push(event.clone());
    }
}

impl Collect {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

/// Records the paths it was given; panics on names containing "bad".
#[derive(Clone, Default)]
struct Recording(Arc<Mutex<Vec<PathBuf>>>);

impl JobRunner for Recording {
    fn run(&self, path: &Path) -> JobOutcome {
        self.0.lock().unwrap().push(path.to_path_buf());
        if path.to_string_lossy().contains("bad") {
            panic!("cannot handle {}", path.display());
        }
        JobOutcome::Done(None)
    }
}

fn events_with(collector: &Arc<Collect>) -> EventDispatcher {
    let mut events = EventDispatcher::with_logging();
    events.add_handler(collector.clone());
    events
}

fn start_master(root: &Path, collector: &Arc<Collect>) -> Result<ServerHandle, Box<dyn std::error::Error>> {
    let config = DispatcherConfig::new(root.to_path_buf());
    let events = events_with(collector);
    let discovery = spawn_discovery(
        root,
        &config.excluded_extensions,
        config.queue_capacity,
        events.clone(),
    )?;
    let dispatcher = Dispatcher::new(discovery, &config, SystemIdentity::new("master", 1), events);
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(spawn_server(listener, dispatcher, true)?)
}

#[test]
fn test_three_paths_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let media = tempdir()?;
    for name in ["a.mkv", "b.mp4", "c.flac"] {
        fs::write(media.path().join(name), name)?;
    }
    fs::write(media.path().join("notes.txt"), "ignored")?;

    let master_events = Arc::new(Collect::default());
    let server = start_master(media.path(), &master_events)?;

    let runner = Recording::default();
    let client = WorkerClient::connect(&server.addr.to_string(), SystemIdentity::new("worker", 7))?;
    let mut worker = Worker::new(client, runner.clone(), EventDispatcher::new());
    let summary = worker.run()?;
    assert_eq!(summary.done, 3);
    assert_eq!(worker.in_flight(), None);
    drop(worker);

    let dispatched = server.join()?;
    assert_eq!(dispatched.assigned, 3);
    assert_eq!(dispatched.done, 3);
    assert_eq!(dispatched.in_flight, 0);

    let seen = runner.0.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            media.path().join("a.mkv"),
            media.path().join("b.mp4"),
            media.path().join("c.flac"),
        ]
    );

    let events = master_events.events();
    let assigned = events
        .iter()
        .filter(|e| matches!(e, Event::JobAssigned { hostname, .. } if hostname == "worker"))
        .count();
    assert_eq!(assigned, 3);
    assert!(events.iter().any(|e| matches!(e, Event::NoJobAvailable { pid, .. } if pid == "7")));
    Ok(())
}

#[test]
fn test_panicking_job_is_reported_as_failure() -> Result<(), Box<dyn std::error::Error>> {
    let media = tempdir()?;
    fs::write(media.path().join("bad.mkv"), "x")?;
    fs::write(media.path().join("good.mkv"), "x")?;

    let master_events = Arc::new(Collect::default());
    let server = start_master(media.path(), &master_events)?;

    let client = WorkerClient::connect(&server.addr.to_string(), SystemIdentity::new("worker", 8))?;
    let mut worker = Worker::new(client, Recording::default(), EventDispatcher::new());
    let summary = worker.run()?;
    assert_eq!((summary.done, summary.failed), (1, 1));
    drop(worker);

    let dispatched = server.join()?;
    assert_eq!((dispatched.done, dispatched.failed), (1, 1));

    let bad = media.path().join("bad.mkv").to_string_lossy().into_owned();
    let failure = master_events
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::JobFailed { path, error, elapsed, .. } if path == bad => Some((error, elapsed)),
            _ => None,
        })
        .ok_or("no failure event")?;
    assert!(failure.0.unwrap_or_default().starts_with("panic: cannot handle"));
    assert!(failure.1.is_some());
    Ok(())
}

#[test]
fn test_dropped_worker_reports_killed_and_job_is_requeued() -> Result<(), Box<dyn std::error::Error>> {
    let media = tempdir()?;
    fs::write(media.path().join("movie.mkv"), "x")?;
    let path = media.path().join("movie.mkv").to_string_lossy().into_owned();

    let master_events = Arc::new(Collect::default());
    let server = start_master(media.path(), &master_events)?;

    // First worker takes the job and goes away before reporting.
    let worker_events = Arc::new(Collect::default());
    let client = WorkerClient::connect(&server.addr.to_string(), SystemIdentity::new("crashy", 9))?;
    let mut worker = Worker::new(client, Recording::default(), events_with(&worker_events));
    assert_eq!(worker.claim()?.as_deref(), Some(path.as_str()));
    assert_eq!(worker.in_flight(), Some(path.as_str()));
    drop(worker);

    assert!(
        worker_events
            .events()
            .contains(&Event::KilledReportSent { path: path.clone() })
    );
    let killed = Event::JobKilled {
        path: path.clone(),
        hostname: "crashy".to_string(),
        pid: "9".to_string(),
    };
    assert!(master_events.events().contains(&killed));

    // The path goes back to the queue for the next worker.
    let runner = Recording::default();
    let client = WorkerClient::connect(&server.addr.to_string(), SystemIdentity::new("steady", 10))?;
    let mut worker = Worker::new(client, runner.clone(), EventDispatcher::new());
    assert_eq!(worker.run()?.done, 1);
    drop(worker);

    let dispatched = server.join()?;
    assert_eq!(dispatched.killed, 1);
    assert_eq!(dispatched.requeued, 1);
    assert_eq!(dispatched.done, 1);
    assert_eq!(runner.0.lock().unwrap().as_slice(), [PathBuf::from(&path)]);
    assert!(
        master_events
            .events()
            .contains(&Event::JobRequeued { path, attempt: 1 })
    );
    Ok(())
}

#[test]
fn test_dispatcher_without_server() {
    let config = DispatcherConfig::new(PathBuf::from("."));
    let discovery = Discovery::from_paths(vec![
        PathBuf::from("/m/one.mkv"),
        PathBuf::from("/m/two.mkv"),
    ]);
    let mut dispatcher = Dispatcher::new(
        discovery,
        &config,
        SystemIdentity::new("master", 1),
        EventDispatcher::new(),
    );
    let worker = SystemIdentity::new("w", 2);
    let first = dispatcher.handle(&Request::new(RequestKind::JobWant, &worker));
    assert_eq!(first.res.as_deref(), Some("true"));
    assert_eq!(first.assigned_path(), Some("/m/one.mkv"));
    assert_eq!(dispatcher.state_of("/m/one.mkv"), Some(JobState::Assigned));

    dispatcher.handle(
        &Request::new(RequestKind::JobSkip, &worker)
            .with_path("/m/one.mkv")
            .with_elapsed(std::time::Duration::from_millis(5)),
    );
    assert_eq!(dispatcher.state_of("/m/one.mkv"), Some(JobState::Skipped));

    let second = dispatcher.handle(&Request::new(RequestKind::JobWant, &worker));
    assert_eq!(second.assigned_path(), Some("/m/two.mkv"));
    dispatcher.handle(&Request::new(RequestKind::JobDone, &worker).with_path("/m/two.mkv"));

    let third = dispatcher.handle(&Request::new(RequestKind::JobWant, &worker));
    assert_eq!(third.res.as_deref(), Some("false"));
    assert_eq!(third.path, None);
    assert!(dispatcher.is_finished());
}
