//! Externally visible playback status.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::metadata::{FeedKind, TerminalType};

/// Coarse playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// A replay reached its last event or a `session-stop`.
    Ended,
    /// Events are being applied on schedule.
    Playing,
    /// Waiting for the operator.
    Paused,
}

impl PlaybackState {
    /// Display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ended => "ended",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the engine, recomputed after every step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    /// Index of the next event to apply.
    pub event_index: usize,
    /// Number of events loaded so far.
    pub event_count: usize,
    /// Time until the armed timer fires, zero when none is armed.
    pub time_to_next_event: Duration,
    /// Current speed multiplier.
    pub speed: f64,
    /// Ended, playing or paused.
    pub state: PlaybackState,
    /// Whether the feed is live.
    pub live: bool,
    /// Feed classification.
    pub feed: FeedKind,
    /// Terminal type, once known.
    pub terminal_type: Option<TerminalType>,
    /// Client address, once known.
    pub client_host: Option<String>,
    /// Server address, once known.
    pub server_host: Option<String>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            event_index: 0,
            event_count: 0,
            time_to_next_event: Duration::ZERO,
            speed: crate::config::DEFAULT_SPEED,
            state: PlaybackState::Paused,
            live: false,
            feed: FeedKind::Old,
            terminal_type: None,
            client_host: None,
            server_host: None,
        }
    }
}

impl PlaybackStatus {
    /// Whether playback has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state == PlaybackState::Ended
    }

    /// Whether playback is paused (and not ended).
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    /// Whether events are being applied on schedule.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

/// Renders the status bar line, e.g. `From: a;  To: b; (playing)`.
impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "From: {};  To: {}; ({})",
            self.client_host.as_deref().unwrap_or(""),
            self.server_host.as_deref().unwrap_or(""),
            self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bar_text() {
        let status = PlaybackStatus {
            client_host: Some("10.0.0.2:5122".into()),
            server_host: Some("db1:22".into()),
            state: PlaybackState::Playing,
            ..PlaybackStatus::default()
        };
        assert_eq!(status.to_string(), "From: 10.0.0.2:5122;  To: db1:22; (playing)");
    }

    #[test]
    fn unknown_hosts_are_blank() {
        let status = PlaybackStatus {
            state: PlaybackState::Ended,
            ..PlaybackStatus::default()
        };
        assert_eq!(status.to_string(), "From: ;  To: ; (ended)");
        assert!(status.is_ended());
        assert!(!status.is_paused());
    }
}
