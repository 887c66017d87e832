//! Error types for ttyreplay.
//!
//! Playback itself is forgiving: malformed payloads, out-of-range seeks and
//! dropped transports are absorbed by the engine. The errors defined here
//! cover the places where something outside the engine genuinely failed
//! (a renderer write, a config file, a recording that is not JSON).

use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of characters of offending input quoted in an error.
const MAX_SNIPPET: usize = 120;

/// Shorten a piece of input for display.
fn snippet(input: &str) -> String {
    if input.chars().count() <= MAX_SNIPPET {
        return input.to_string();
    }
    let head: String = input.chars().take(MAX_SNIPPET).collect();
    format!("{head}... ({} bytes total)", input.len())
}

/// The main error type for ttyreplay operations.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A session event or recording could not be parsed.
    #[error("invalid session JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An event payload is not valid base64.
    #[error("undecodable event payload: {0}")]
    Payload(#[from] base64::DecodeError),

    /// A recording file is not a sequence of session events.
    #[error("invalid recording {path}: {message}")]
    InvalidRecording {
        /// The recording that failed to load.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// A transport frame was not a session event.
    #[error("unexpected transport frame: {}", snippet(.frame))]
    UnexpectedFrame {
        /// The frame as received.
        frame: String,
    },

    /// The transport is closed.
    #[error("transport closed")]
    TransportClosed,

    /// Transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// WebSocket failure on the live feed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The renderer rejected a write, reset or resize.
    #[error("renderer error: {message}")]
    Renderer {
        /// Description of the failure.
        message: String,
    },

    /// The player task is gone.
    #[error("player is no longer running")]
    PlayerStopped,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Result type alias for ttyreplay operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

impl PlaybackError {
    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O result with context.
    pub fn with_io_context<T>(result: std::io::Result<T>, context: impl Into<String>) -> Result<T> {
        result.map_err(|e| Self::io_context(context, e))
    }

    /// Create an invalid recording error.
    pub fn invalid_recording(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidRecording {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected frame error.
    pub fn unexpected_frame(frame: impl Into<String>) -> Self {
        Self::UnexpectedFrame {
            frame: frame.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a renderer error.
    pub fn renderer(message: impl Into<String>) -> Self {
        Self::Renderer {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error means the remote side of the feed went away.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::TransportClosed | Self::WebSocket(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PlaybackError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
