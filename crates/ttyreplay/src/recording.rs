//! Recorded session files.
//!
//! A recording is a JSON array of session events, written one event per
//! line:
//!
//! ```text
//! [
//! {"type":"session-start","client_host":"10.0.0.2:5122",...},
//! {"type":"new-message","offset":17,"direction":"incoming","data":"aGk="},
//! {"type":"session-stop","offset":2040}
//! ]
//! ```
//!
//! The recorder only writes the closing `]` when the session ends, so a
//! file for a session still in progress ends after the last event (possibly
//! with a trailing comma). Such files load as [incomplete](Recording::complete).

use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{PlaybackError, Result};
use crate::event::SessionEvent;

/// A loaded recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recording {
    /// Events in file order.
    pub events: Vec<SessionEvent>,
    /// Whether the file was closed by the recorder.
    pub complete: bool,
}

impl Recording {
    /// Whether the recording contains a `session-stop`.
    #[must_use]
    pub fn has_stop(&self) -> bool {
        self.events.iter().any(SessionEvent::is_stop)
    }

    /// Offset of the last event, in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.events.last().map_or(0, |event| event.offset)
    }
}

/// Parse recording text.
pub fn parse_recording(content: &str) -> Result<Recording> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Recording::default());
    }
    if !trimmed.starts_with('[') {
        return Err(PlaybackError::invalid_recording(
            "<input>",
            "not a JSON array of session events",
        ));
    }

    if trimmed.ends_with(']') {
        if let Ok(events) = serde_json::from_str::<Vec<SessionEvent>>(trimmed) {
            return Ok(Recording {
                events,
                complete: true,
            });
        }
    }

    // Still being written: close the array ourselves.
    let body = trimmed.trim_end_matches(|c: char| c == ',' || c.is_whitespace());
    let events: Vec<SessionEvent> = serde_json::from_str(&format!("{body}]"))?;
    debug!(events = events.len(), "loaded incomplete recording");
    Ok(Recording {
        events,
        complete: false,
    })
}

/// Read a recording from a reader.
pub fn read_recording<R: Read>(mut reader: R) -> Result<Recording> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    parse_recording(&content)
}

/// Load a recording file.
pub fn load_recording(path: &Path) -> Result<Recording> {
    let content = PlaybackError::with_io_context(
        std::fs::read_to_string(path),
        format!("reading recording {}", path.display()),
    )?;
    parse_recording(&content).map_err(|e| PlaybackError::invalid_recording(path, e.to_string()))
}

/// Write events in the recorder's file layout.
///
/// With `complete` false the closing bracket is left off, as the recorder
/// does while a session is still running.
pub fn write_recording<W: Write>(
    writer: &mut W,
    events: &[SessionEvent],
    complete: bool,
) -> Result<()> {
    writer.write_all(b"[\n")?;
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",\n")?;
        }
        writer.write_all(event.to_json()?.as_bytes())?;
    }
    if complete {
        writer.write_all(b"\n]")?;
    }
    writer.flush()?;
    Ok(())
}
