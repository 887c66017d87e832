//! Session event model.
//!
//! A [`SessionEvent`] is one timestamped occurrence in a recorded or live
//! terminal session. Events arrive as flat JSON records tagged by `type`:
//!
//! ```json
//! {"type":"new-message","offset":1200,"direction":"incoming","data":"aGk="}
//! ```
//!
//! Byte payloads stay base64-encoded inside the event and are decoded when the
//! engine applies them, so a payload that fails to decode never keeps the event
//! out of the sequence.

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Request type that marks a one-shot command session.
pub const REQUEST_EXEC: &str = "exec";

/// Request type that marks an interactive terminal session.
pub const REQUEST_PTY: &str = "pty-req";

/// Length of the SSH string prefix carried in front of exec payloads.
pub const EXEC_PREFIX_LEN: usize = 4;

/// One timestamped occurrence in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Milliseconds since session start.
    #[serde(default)]
    pub offset: i64,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The closed set of event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// The session opened.
    #[serde(rename = "session-start")]
    SessionStart(SessionStart),
    /// The client terminal changed size.
    #[serde(rename = "window-resize")]
    WindowResize(WindowResize),
    /// Bytes flowed in one direction.
    #[serde(rename = "new-message", alias = "message")]
    Message(Message),
    /// The session closed.
    #[serde(rename = "session-stop")]
    SessionStop,
    /// A channel request (exec, pty-req, ...).
    #[serde(rename = "new-request", alias = "request")]
    Request(Request),
    /// Any other record the recorder emits (e.g. `new-channel`).
    #[serde(other)]
    Unknown,
}

/// Payload of a `session-start` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
    /// Address of the connecting client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_host: Option<String>,
    /// Address of the upstream server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_host: Option<String>,
    /// Login name used for the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Session key assigned by the recorder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Wall-clock start, seconds since the Unix epoch.
    #[serde(default, rename = "start", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

/// Payload of a `window-resize` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowResize {
    /// Terminal rows.
    #[serde(default)]
    pub term_rows: u32,
    /// Terminal columns.
    #[serde(default)]
    pub term_cols: u32,
}

/// Direction of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Server output shown on the terminal.
    Incoming,
    /// Client keystrokes.
    Outgoing,
    /// A direction this player does not know.
    #[serde(other)]
    Other,
}

/// Payload of a message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Which way the bytes went.
    pub direction: Direction,
    /// Base64-encoded bytes.
    #[serde(default)]
    pub data: String,
}

impl Message {
    /// Decode the payload bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_payload(&self.data)
    }
}

/// Kind of channel request, as far as playback cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A one-shot command.
    Exec,
    /// A pseudo-terminal allocation.
    Pty,
    /// Anything else (env, shell, window-change, ...).
    Other,
}

/// Payload of a request event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// SSH request type string.
    #[serde(default)]
    pub request_type: String,
    /// Base64-encoded request payload.
    #[serde(default)]
    pub request_payload: String,
}

impl Request {
    /// Classify the request.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        match self.request_type.as_str() {
            REQUEST_EXEC => RequestKind::Exec,
            REQUEST_PTY => RequestKind::Pty,
            _ => RequestKind::Other,
        }
    }

    /// Decode the payload bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_payload(&self.request_payload)
    }

    /// The command line of an exec request (payload minus its length prefix).
    pub fn exec_command(&self) -> Result<Vec<u8>> {
        let payload = self.decode()?;
        Ok(payload.get(EXEC_PREFIX_LEN..).unwrap_or_default().to_vec())
    }
}

fn decode_payload(data: &str) -> Result<Vec<u8>> {
    Ok(BASE64_STANDARD.decode(data)?)
}

/// Encode bytes the way they travel on the wire.
#[must_use]
pub fn encode_payload(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

impl SessionEvent {
    /// Create an event.
    #[must_use]
    pub const fn new(offset: i64, kind: EventKind) -> Self {
        Self { offset, kind }
    }

    /// Server output.
    #[must_use]
    pub fn incoming(offset: i64, data: impl AsRef<[u8]>) -> Self {
        Self::message(offset, Direction::Incoming, data)
    }

    /// Client keystrokes.
    #[must_use]
    pub fn outgoing(offset: i64, data: impl AsRef<[u8]>) -> Self {
        Self::message(offset, Direction::Outgoing, data)
    }

    fn message(offset: i64, direction: Direction, data: impl AsRef<[u8]>) -> Self {
        Self::new(
            offset,
            EventKind::Message(Message {
                direction,
                data: encode_payload(data.as_ref()),
            }),
        )
    }

    /// A window resize.
    #[must_use]
    pub const fn resize(offset: i64, rows: u32, cols: u32) -> Self {
        Self::new(
            offset,
            EventKind::WindowResize(WindowResize {
                term_rows: rows,
                term_cols: cols,
            }),
        )
    }

    /// A channel request with a raw payload.
    #[must_use]
    pub fn request(offset: i64, request_type: impl Into<String>, payload: &[u8]) -> Self {
        Self::new(
            offset,
            EventKind::Request(Request {
                request_type: request_type.into(),
                request_payload: encode_payload(payload),
            }),
        )
    }

    /// An exec request for `command`, with the SSH length prefix.
    #[must_use]
    pub fn exec(offset: i64, command: &str) -> Self {
        let mut payload = (command.len() as u32).to_be_bytes().to_vec();
        payload.extend_from_slice(command.as_bytes());
        Self::request(offset, REQUEST_EXEC, &payload)
    }

    /// Session start.
    #[must_use]
    pub const fn start(offset: i64, start: SessionStart) -> Self {
        Self::new(offset, EventKind::SessionStart(start))
    }

    /// Session stop.
    #[must_use]
    pub const fn stop(offset: i64) -> Self {
        Self::new(offset, EventKind::SessionStop)
    }

    /// Parse one event from a JSON record.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a JSON record.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The offset as a duration (negative offsets clamp to zero).
    #[must_use]
    pub fn at(&self) -> Duration {
        Duration::from_millis(self.offset.max(0) as u64)
    }

    /// Whether this event ends the session.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self.kind, EventKind::SessionStop)
    }

    /// Short name of the event kind, for logs.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::SessionStart(_) => "session-start",
            EventKind::WindowResize(_) => "window-resize",
            EventKind::Message(_) => "message",
            EventKind::SessionStop => "session-stop",
            EventKind::Request(_) => "request",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}ms", self.kind_name(), self.offset)
    }
}
