//! In-memory sinks.
//!
//! [`MemoryRenderer`], [`MemoryLog`] and [`CountingAck`] record what the
//! engine does to them instead of drawing anything. Clones share state, so a
//! caller can keep a clone to inspect after handing one to an engine. The
//! `dump` command uses them to print a session's final output.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{PlaybackError, Result};
use crate::render::{CellMetrics, Geometry, KeystrokeLog, Renderer};
use crate::transport::Acknowledge;

/// What a [`MemoryRenderer`] has received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    /// Every write, in order, across resets.
    pub writes: Vec<Vec<u8>>,
    /// Bytes written since the last reset.
    pub output: Vec<u8>,
    /// Number of resets.
    pub resets: usize,
    /// Every resize, in order.
    pub resizes: Vec<Geometry>,
}

impl Screen {
    /// Current size, if the renderer was ever resized.
    #[must_use]
    pub fn geometry(&self) -> Option<Geometry> {
        self.resizes.last().copied()
    }
}

/// A renderer that keeps everything written to it.
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderer {
    screen: Arc<Mutex<Screen>>,
    metrics: CellMetrics,
}

impl MemoryRenderer {
    /// Create an empty renderer with default cell metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty renderer reporting `metrics`.
    #[must_use]
    pub fn with_metrics(metrics: CellMetrics) -> Self {
        Self {
            screen: Arc::default(),
            metrics,
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Screen {
        self.screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bytes written since the last reset.
    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        self.snapshot().output
    }

    /// Output since the last reset as text.
    #[must_use]
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }

    /// Every write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.snapshot().writes
    }

    /// Number of writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writes
            .len()
    }
}

impl Renderer for MemoryRenderer {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut screen = self.screen.lock().unwrap_or_else(PoisonError::into_inner);
        screen.writes.push(data.to_vec());
        screen.output.extend_from_slice(data);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let mut screen = self.screen.lock().unwrap_or_else(PoisonError::into_inner);
        screen.output.clear();
        screen.resets += 1;
        Ok(())
    }

    fn resize(&mut self, geometry: Geometry) -> Result<()> {
        let mut screen = self.screen.lock().unwrap_or_else(PoisonError::into_inner);
        screen.resizes.push(geometry);
        Ok(())
    }

    fn cell_metrics(&self) -> CellMetrics {
        self.metrics
    }
}

/// A keystroke log backed by a string.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    text: Arc<Mutex<String>>,
    appends: Arc<AtomicUsize>,
}

impl MemoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text since the last clear.
    #[must_use]
    pub fn text(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of appends so far.
    #[must_use]
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

impl KeystrokeLog for MemoryLog {
    fn append(&mut self, text: &str) -> Result<()> {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// An acknowledger that counts.
#[derive(Debug, Clone, Default)]
pub struct CountingAck {
    count: Arc<AtomicUsize>,
    closed: bool,
}

impl CountingAck {
    /// Create a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an acknowledger whose transport is already gone.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    /// Acknowledgements sent so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Acknowledge for CountingAck {
    async fn ack(&mut self) -> Result<()> {
        if self.closed {
            return Err(PlaybackError::TransportClosed);
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
