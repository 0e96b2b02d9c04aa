//! TCP endpoint of the master.
//!
//! Each accepted connection gets a reader thread that parses requests and
//! forwards them, together with a reply channel, to the single serving
//! loop. The loop handles one request at a time and sends exactly one
//! reply per request.

use crossbeam_channel::{Sender, bounded, unbounded};

use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use super::{DispatchSummary, Dispatcher};
use crate::error::{CoreError, CoreResult};
use crate::protocol::{Request, RequestKind, Response, read_message, write_message};

struct Envelope {
    request: Request,
    reply: Sender<Response>,
}

/// A master serving on a background thread.
pub struct ServerHandle {
    pub addr: SocketAddr,
    thread: JoinHandle<CoreResult<DispatchSummary>>,
}

impl ServerHandle {
    /// Waits for the serving loop to return.
    pub fn join(self) -> CoreResult<DispatchSummary> {
        self.thread
            .join()
            .map_err(|_| CoreError::Network("server thread panicked".to_string()))?
    }
}

/// Serves requests from `listener`.
///
/// With `exit_when_done` the loop returns once every job is finished and
/// a `job_want` has been refused; otherwise it serves forever.
pub fn serve(
    listener: TcpListener,
    mut dispatcher: Dispatcher,
    exit_when_done: bool,
) -> CoreResult<DispatchSummary> {
    let (tx, rx) = unbounded::<Envelope>();

    thread::Builder::new()
        .name("accept".to_string())
        .spawn(move || accept_loop(listener, tx))?;

    for envelope in rx.iter() {
        log::trace!(
            "{} from {}:{}",
            envelope.request.req.as_str(),
            envelope.request.hostname,
            envelope.request.pid
        );
        let response = dispatcher.handle(&envelope.request);
        let refused = envelope.request.req == RequestKind::JobWant
            && response.assigned_path().is_none();
        if envelope.reply.send(response).is_err() {
            log::debug!("Connection closed before its reply was sent");
        }
        // Stop after a worker has been told there is no more work.
        if exit_when_done && refused && dispatcher.is_finished() {
            log::info!("All jobs finished, stopping");
            break;
        }
    }

    Ok(dispatcher.summary())
}

/// Starts [`serve`] on a background thread.
pub fn spawn_server(
    listener: TcpListener,
    dispatcher: Dispatcher,
    exit_when_done: bool,
) -> CoreResult<ServerHandle> {
    let addr = listener.local_addr()?;
    let thread = thread::Builder::new()
        .name("dispatcher".to_string())
        .spawn(move || serve(listener, dispatcher, exit_when_done))?;
    Ok(ServerHandle { addr, thread })
}

fn accept_loop(listener: TcpListener, tx: Sender<Envelope>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name("connection".to_string())
                    .spawn(move || {
                        if let Err(e) = connection_loop(stream, tx) {
                            log::debug!("Connection ended: {}", e);
                        }
                    });
                if let Err(e) = spawned {
                    log::error!("Cannot start connection thread: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to accept connection: {}", e),
        }
    }
}

fn connection_loop(stream: TcpStream, tx: Sender<Envelope>) -> CoreResult<()> {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string());
    log::debug!("Accepted connection from {}", peer);

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let request = match read_message::<Request>(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            // Every receive gets a reply, so a malformed message is
            // answered like an unknown request.
            Err(CoreError::Protocol(msg)) => {
                log::warn!("{} from {}", msg, peer);
                Request {
                    req: RequestKind::Unknown,
                    hostname: String::new(),
                    pid: String::new(),
                    path: None,
                    filepath_output: None,
                    elapsed_time: None,
                    error: None,
                }
            }
            Err(e) => return Err(e),
        };

        let (reply_tx, reply_rx) = bounded(1);
        tx.send(Envelope {
            request,
            reply: reply_tx,
        })
        .map_err(|_| CoreError::Network("dispatcher stopped".to_string()))?;

        let response = reply_rx
            .recv()
            .map_err(|_| CoreError::Network("dispatcher stopped".to_string()))?;
        write_message(&mut writer, &response)?;
    }
}
