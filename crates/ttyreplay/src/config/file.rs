//! File-based configuration.
//!
//! ```toml
//! speed = 1.5
//! max_idle_ms = 2000
//! log_level = "info"
//!
//! [geometry]
//! rows = 24
//! cols = 80
//! width = 800
//! height = 300
//!
//! [cell]
//! width = 10.0
//! height = 12.5
//! ```
//!
//! Every key is optional; absent keys keep the value they are layered onto.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::render::{CellMetrics, Geometry};

/// Default config file name looked up by [`find`].
pub const CONFIG_FILE_NAME: &str = "ttyreplay.toml";

/// Contents of a config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Initial speed.
    pub speed: Option<f64>,
    /// Speed step.
    pub speed_step: Option<f64>,
    /// Slowest allowed speed.
    pub min_speed: Option<f64>,
    /// Fastest allowed speed.
    pub max_speed: Option<f64>,
    /// Longest gap between events, in milliseconds.
    pub max_idle_ms: Option<u64>,
    /// Log filter.
    pub log_level: Option<String>,
    /// Initial terminal geometry.
    pub geometry: Option<GeometrySection>,
    /// Cell size in pixels.
    pub cell: Option<CellSection>,
}

/// `[geometry]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GeometrySection {
    /// Rows.
    pub rows: u32,
    /// Columns.
    pub cols: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// `[cell]` table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CellSection {
    /// Cell width in pixels.
    pub width: f64,
    /// Cell height in pixels.
    pub height: f64,
}

impl FileConfig {
    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PlaybackError::config(e.to_string()))
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = PlaybackError::with_io_context(
            std::fs::read_to_string(path),
            format!("reading config {}", path.display()),
        )?;
        Self::parse(&content)
    }

    /// Overlay the keys that are present onto `config`.
    #[must_use]
    pub fn apply(&self, mut config: PlaybackConfig) -> PlaybackConfig {
        if let Some(speed) = self.speed {
            config.speed = speed;
        }
        if let Some(step) = self.speed_step {
            config.speed_step = step;
        }
        if let Some(min) = self.min_speed {
            config.min_speed = min;
        }
        if let Some(max) = self.max_speed {
            config.max_speed = max;
        }
        if let Some(ms) = self.max_idle_ms {
            config.max_idle = Some(Duration::from_millis(ms));
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
        if let Some(g) = self.geometry {
            config.initial_geometry = Geometry {
                rows: g.rows,
                cols: g.cols,
                width: g.width,
                height: g.height,
            };
        }
        if let Some(cell) = self.cell {
            config.cell_metrics = CellMetrics::new(cell.width, cell.height);
        }
        config
    }
}

/// Look for [`CONFIG_FILE_NAME`] in each directory, in order.
#[must_use]
pub fn find<I, P>(dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    dirs.into_iter()
        .map(|dir| dir.as_ref().join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
}
