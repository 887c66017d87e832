//! Convenient re-exports.
//!
//! ```
//! use ttyreplay::prelude::*;
//! ```

pub use crate::config::PlaybackConfig;
pub use crate::engine::{Engine, PlaybackState, PlaybackStatus};
pub use crate::error::{PlaybackError, Result};
pub use crate::event::{EventKind, SessionEvent};
pub use crate::player::{Command, Player, PlayerHandle};
pub use crate::recording::{Recording, load_recording};
pub use crate::render::{CellMetrics, Geometry, KeystrokeLog, Renderer};
pub use crate::transport::{Acknowledge, Feed, Inbound, Request, channel};
