// ============================================================================
// fleetcode-core/src/protocol.rs
// ============================================================================
//
// JOB PROTOCOL: Request/Reply Messages Between Workers and the Master
//
// Messages are flat JSON objects of string fields, one object per line,
// over TCP. Each connection follows a strict request/reply discipline:
// the worker sends one request and reads exactly one reply before sending
// the next.
//
//   worker -> master   {"req":"job_want","hostname":"h1","pid":"42"}
//   master -> worker   {"hostname":"m","pid":"7","res":"true","path":"/media/a.mkv"}
//
// KEY COMPONENTS:
// - RequestKind / Request / Response: message types
// - write_message / read_message: line framing
// - Connection: client side with reconnect after a failed exchange

// ---- External crate imports ----
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---- Standard library imports ----
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult};
use crate::system_info::SystemIdentity;

/// Value of the `req` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    JobWant,
    JobDone,
    JobFail,
    JobSkip,
    Killed,
    /// Anything this build does not know; answered with identity only
    #[serde(other)]
    Unknown,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::JobWant => "job_want",
            RequestKind::JobDone => "job_done",
            RequestKind::JobFail => "job_fail",
            RequestKind::JobSkip => "job_skip",
            RequestKind::Killed => "killed",
            RequestKind::Unknown => "unknown",
        }
    }
}

/// Worker to master message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub req: RequestKind,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub pid: String,
    #[serde(default, alias = "filepath_input", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath_output: Option<String>,
    /// Seconds with three decimals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Request {
    pub fn new(req: RequestKind, identity: &SystemIdentity) -> Self {
        Self {
            req,
            hostname: identity.hostname.clone(),
            pid: identity.pid.to_string(),
            path: None,
            filepath_output: None,
            elapsed_time: None,
            error: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<String>) -> Self {
        self.filepath_output = Some(path.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_time = Some(format_elapsed(elapsed));
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Master to worker message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub hostname: String,
    pub pid: String,
    /// `"true"` or `"false"`, only on `job_want` replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Response {
    /// Identity-only acknowledgement.
    pub fn ack(identity: &SystemIdentity) -> Self {
        Self {
            hostname: identity.hostname.clone(),
            pid: identity.pid.to_string(),
            res: None,
            path: None,
        }
    }

    pub fn job(identity: &SystemIdentity, path: impl Into<String>) -> Self {
        Self {
            res: Some("true".to_string()),
            path: Some(path.into()),
            ..Self::ack(identity)
        }
    }

    pub fn no_job(identity: &SystemIdentity) -> Self {
        Self {
            res: Some("false".to_string()),
            ..Self::ack(identity)
        }
    }

    /// The assigned path of a positive `job_want` reply.
    pub fn assigned_path(&self) -> Option<&str> {
        match self.res.as_deref() {
            Some("true") => self.path.as_deref(),
            _ => None,
        }
    }
}

/// Formats a duration as seconds with three decimals.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64())
}

/// Writes one message followed by a newline and flushes.
pub fn write_message<T: Serialize>(writer: &mut impl Write, message: &T) -> CoreResult<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .map_err(|e| CoreError::Network(e.to_string()))?;
    writer.flush().map_err(|e| CoreError::Network(e.to_string()))
}

/// Reads one message. `Ok(None)` means the peer closed the connection.
pub fn read_message<T: DeserializeOwned>(reader: &mut impl BufRead) -> CoreResult<Option<T>> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| CoreError::Network(e.to_string()))?;
    if read == 0 {
        return Ok(None);
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| CoreError::Protocol(format!("malformed message {:?}: {}", line.trim_end(), e)))
}

/// Client end of the protocol.
///
/// The socket is opened lazily and dropped after any failed exchange, so a
/// later request starts on a fresh connection.
#[derive(Debug)]
pub struct Connection {
    addr: String,
    stream: Option<(BufReader<TcpStream>, TcpStream)>,
}

impl Connection {
    /// Connects to `addr` (host:port).
    pub fn connect(addr: impl Into<String>) -> CoreResult<Self> {
        let mut conn = Self {
            addr: addr.into(),
            stream: None,
        };
        conn.ensure_connected()?;
        Ok(conn)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn ensure_connected(&mut self) -> CoreResult<&mut (BufReader<TcpStream>, TcpStream)> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(&self.addr)
                .map_err(|e| CoreError::Network(format!("cannot connect to {}: {}", self.addr, e)))?;
            let reader = BufReader::new(
                stream
                    .try_clone()
                    .map_err(|e| CoreError::Network(e.to_string()))?,
            );
            log::debug!("Connected to {}", self.addr);
            self.stream = Some((reader, stream));
        }
        self.stream
            .as_mut()
            .ok_or_else(|| CoreError::Network("connection unavailable".to_string()))
    }

    /// Sends `request` and waits for its reply.
    pub fn request(&mut self, request: &Request) -> CoreResult<Response> {
        let result = self.exchange(request);
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    fn exchange(&mut self, request: &Request) -> CoreResult<Response> {
        let (reader, writer) = self.ensure_connected()?;
        write_message(writer, request)?;
        read_message(reader)?
            .ok_or_else(|| CoreError::Network("master closed the connection".to_string()))
    }
}
