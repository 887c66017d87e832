//! Session metadata accumulated during playback.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{SessionStart, WindowResize};

/// How the session's terminal was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalType {
    /// Interactive session with a pseudo-terminal.
    Pty,
    /// One-shot command.
    Exec,
}

impl TerminalType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pty => "pty",
            Self::Exec => "exec",
        }
    }
}

impl fmt::Display for TerminalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the feed is a live tail or an old recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Tailing a session that is still connected.
    Live,
    /// Replaying a finished (or dropped) session.
    #[default]
    Old,
}

impl FeedKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Old => "old",
        }
    }
}

/// What is known about the session being played.
///
/// Fields fill in as `session-start`, `window-resize` and request events are
/// applied. A later value replaces an earlier one; absent values never erase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Address of the connecting client.
    pub client_host: Option<String>,
    /// Address of the upstream server.
    pub server_host: Option<String>,
    /// Login name.
    pub username: Option<String>,
    /// Recorder session key.
    pub key: Option<String>,
    /// Wall-clock start, seconds since the Unix epoch.
    pub start_time: Option<i64>,
    /// Last known terminal rows.
    pub term_rows: Option<u32>,
    /// Last known terminal columns.
    pub term_cols: Option<u32>,
    /// Terminal type, inferred from requests.
    pub terminal_type: Option<TerminalType>,
    /// Whether the remote side is still connected.
    pub live: bool,
    /// Feed classification.
    pub feed: FeedKind,
}

fn merge<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

impl SessionMetadata {
    /// Merge a `session-start` payload.
    pub fn merge_start(&mut self, start: &SessionStart) {
        merge(&mut self.client_host, start.client_host.clone());
        merge(&mut self.server_host, start.server_host.clone());
        merge(&mut self.username, start.username.clone());
        merge(&mut self.key, start.key.clone());
        merge(&mut self.start_time, start.start_time);
    }

    /// Merge a `window-resize` payload.
    pub const fn merge_resize(&mut self, resize: &WindowResize) {
        self.term_rows = Some(resize.term_rows);
        self.term_cols = Some(resize.term_cols);
    }

    /// Mark the session as tailing a connected remote.
    pub const fn set_live(&mut self) {
        self.live = true;
        self.feed = FeedKind::Live;
    }

    /// Mark the session as no longer connected.
    pub const fn set_disconnected(&mut self) {
        self.live = false;
        self.feed = FeedKind::Old;
    }

    /// Forget everything learned from events, keeping the live/feed mode.
    #[must_use]
    pub fn mode_only(&self) -> Self {
        Self {
            live: self.live,
            feed: self.feed,
            ..Self::default()
        }
    }
}
