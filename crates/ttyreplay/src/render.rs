//! Output sinks driven by the playback engine.
//!
//! - [`Renderer`]: the terminal grid. Writes are asynchronous and complete
//!   only once the renderer has consumed the bytes.
//! - [`KeystrokeLog`]: the append-only keystroke pane.

use std::future::Future;

use crate::error::Result;

/// Size of one terminal cell in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    /// Cell width.
    pub width: f64,
    /// Cell height.
    pub height: f64,
}

impl Default for CellMetrics {
    fn default() -> Self {
        // 800x300 px over 80x24 cells
        Self {
            width: 10.0,
            height: 12.5,
        }
    }
}

impl CellMetrics {
    /// Create cell metrics.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Geometry of a `rows` x `cols` grid.
    ///
    /// Pixel sizes carry one extra pixel and are truncated, matching how the
    /// recorder's viewer sizes its terminal element.
    #[must_use]
    pub fn geometry(&self, rows: u32, cols: u32) -> Geometry {
        Geometry {
            rows,
            cols,
            width: (f64::from(cols) * self.width + 1.0) as u32,
            height: (f64::from(rows) * self.height + 1.0) as u32,
        }
    }
}

/// Target size for a renderer resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Terminal rows.
    pub rows: u32,
    /// Terminal columns.
    pub cols: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            rows: 24,
            cols: 80,
            width: 800,
            height: 300,
        }
    }
}

/// A terminal renderer.
pub trait Renderer: Send {
    /// Write terminal bytes. The future resolves after the renderer has
    /// consumed them.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Clear the screen, scrollback and cursor state.
    fn reset(&mut self) -> Result<()>;

    /// Resize the terminal.
    fn resize(&mut self, geometry: Geometry) -> Result<()>;

    /// Current cell size.
    fn cell_metrics(&self) -> CellMetrics;
}

/// The keystroke pane.
pub trait KeystrokeLog: Send {
    /// Append already-escaped text and scroll to the end.
    fn append(&mut self, text: &str) -> Result<()>;

    /// Remove all text.
    fn clear(&mut self) -> Result<()>;
}
