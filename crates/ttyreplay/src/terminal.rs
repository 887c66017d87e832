//! Sinks for a real terminal.
//!
//! [`TerminalRenderer`] replays output onto the controlling terminal through
//! crossterm. [`FileLog`] keeps the keystroke log in a file. [`key_command`]
//! maps operator key presses to player commands.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use crossterm::cursor::MoveTo;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{Clear, ClearType, SetSize, SetTitle};
use crossterm::{execute, queue};
use tracing::debug;

use crate::engine::PlaybackStatus;
use crate::error::{PlaybackError, Result};
use crate::player::Command;
use crate::render::{CellMetrics, Geometry, KeystrokeLog, Renderer};

/// Renders onto a terminal writer, normally stdout.
#[derive(Debug)]
pub struct TerminalRenderer<W> {
    out: W,
    metrics: CellMetrics,
    resize_terminal: bool,
}

impl TerminalRenderer<std::io::Stdout> {
    /// Render onto stdout, measuring the cell size when the terminal reports
    /// its pixel size.
    #[must_use]
    pub fn stdout(fallback: CellMetrics) -> Self {
        Self::new(std::io::stdout(), measure_cells().unwrap_or(fallback))
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    /// Render onto `out`.
    pub const fn new(out: W, metrics: CellMetrics) -> Self {
        Self {
            out,
            metrics,
            resize_terminal: false,
        }
    }

    /// Ask the terminal emulator to follow recorded window resizes.
    #[must_use]
    pub const fn resize_terminal(mut self, enabled: bool) -> Self {
        self.resize_terminal = enabled;
        self
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.out
            .write_all(data)
            .and_then(|()| self.out.flush())
            .map_err(|e| PlaybackError::renderer(e.to_string()))
    }

    fn reset(&mut self) -> Result<()> {
        queue!(self.out, Clear(ClearType::Purge), Clear(ClearType::All), MoveTo(0, 0))
            .and_then(|()| self.out.flush())
            .map_err(|e| PlaybackError::renderer(e.to_string()))
    }

    fn resize(&mut self, geometry: Geometry) -> Result<()> {
        debug!(?geometry, "terminal resize");
        if !self.resize_terminal {
            return Ok(());
        }
        let cols = u16::try_from(geometry.cols).unwrap_or(u16::MAX);
        let rows = u16::try_from(geometry.rows).unwrap_or(u16::MAX);
        execute!(self.out, SetSize(cols, rows)).map_err(|e| PlaybackError::renderer(e.to_string()))
    }

    fn cell_metrics(&self) -> CellMetrics {
        self.metrics
    }
}

/// Show the status bar text in the terminal title.
pub fn show_status<W: Write>(out: &mut W, status: &PlaybackStatus) -> Result<()> {
    execute!(out, SetTitle(status.to_string()))
        .map_err(|e| PlaybackError::io_context("setting title", e))
}

/// Cell size from the terminal's reported pixel size.
fn measure_cells() -> Option<CellMetrics> {
    let size = crossterm::terminal::window_size().ok()?;
    if size.width == 0 || size.height == 0 || size.columns == 0 || size.rows == 0 {
        return None;
    }
    Some(CellMetrics::new(
        f64::from(size.width) / f64::from(size.columns),
        f64::from(size.height) / f64::from(size.rows),
    ))
}

/// Keystroke log written to a file.
///
/// Clearing truncates the file.
#[derive(Debug)]
pub struct FileLog {
    file: File,
}

impl FileLog {
    /// Create (or truncate) the log file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = PlaybackError::with_io_context(
            File::create(path),
            format!("creating keystroke log {}", path.display()),
        )?;
        Ok(Self { file })
    }
}

impl KeystrokeLog for FileLog {
    fn append(&mut self, text: &str) -> Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.rewind()?;
        Ok(())
    }
}

/// Keeps the terminal in raw mode while alive.
#[derive(Debug)]
pub struct RawModeGuard(());

impl RawModeGuard {
    /// Enter raw mode.
    pub fn enable() -> Result<Self> {
        PlaybackError::with_io_context(crossterm::terminal::enable_raw_mode(), "enabling raw mode")?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Player command for an operator key press.
///
/// `q`, `Esc` and `Ctrl-C` shut down.
#[must_use]
pub fn key_command(key: &KeyEvent) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Command::Shutdown)
        }
        KeyCode::Char(' ') => Some(Command::Toggle),
        KeyCode::Char('n') | KeyCode::Right => Some(Command::Next),
        KeyCode::Char('p') | KeyCode::Left => Some(Command::Prev),
        KeyCode::Char('+' | '=') | KeyCode::Up => Some(Command::IncreaseSpeed),
        KeyCode::Char('-') | KeyCode::Down => Some(Command::DecreaseSpeed),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Shutdown),
        _ => None,
    }
}
