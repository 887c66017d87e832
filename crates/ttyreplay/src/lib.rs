//! ttyreplay: paced playback of recorded and live terminal sessions
//!
//! This crate turns a sequence of timestamped session events (server output,
//! client keystrokes, window resizes, channel requests) into correctly paced
//! terminal output and a parallel keystroke log.
//!
//! # Features
//!
//! - **Replay** of finished recordings with pause, seek and variable speed
//! - **Live tailing** of in-progress sessions with per-event acknowledgement
//!   back to the sender
//! - **Drift-free speed changes**: the time left until the next event is
//!   rescaled, not restarted
//! - **Seeking** that rebuilds terminal state with a single flush
//! - **WebSocket client** for recorder servers
//!
//! # Example
//!
//! ```no_run
//! use ttyreplay::headless::{MemoryLog, MemoryRenderer};
//! use ttyreplay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let recording = load_recording(std::path::Path::new("session.json"))?;
//!     let renderer = MemoryRenderer::new();
//!     let engine = Engine::replay(renderer.clone(), MemoryLog::new(), PlaybackConfig::default());
//!
//!     let (player, handle) = Player::new(engine);
//!     let task = player.spawn();
//!     handle.load(recording.events).await?;
//!     handle.play().await?;
//!
//!     let mut status = handle.watch_status();
//!     while !status.borrow_and_update().is_ended() {
//!         if status.changed().await.is_err() {
//!             break;
//!         }
//!     }
//!     handle.shutdown().await?;
//!     drop(task);
//!     println!("{}", renderer.output_string());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod headless;
pub mod keystrokes;
pub mod metadata;
pub mod player;
pub mod prelude;
pub mod recording;
pub mod render;
pub mod terminal;
pub mod transport;

pub use config::PlaybackConfig;
pub use engine::{Applied, ArmedTimer, Engine, PlaybackState, PlaybackStatus};
pub use error::{PlaybackError, Result};
pub use event::{Direction, EventKind, SessionEvent, SessionStart, WindowResize};
pub use keystrokes::escape_keystrokes;
pub use metadata::{FeedKind, SessionMetadata, TerminalType};
pub use player::{Command, Player, PlayerHandle};
pub use recording::{Recording, load_recording, parse_recording, write_recording};
pub use render::{CellMetrics, Geometry, KeystrokeLog, Renderer};
pub use transport::{Acknowledge, Feed, FeedSource, Inbound, NoAck, Request};
