//! Configuration types for ttyreplay.
//!
//! [`PlaybackConfig`] is built in layers: defaults, then an optional TOML
//! file ([`file`]), then `TTYREPLAY_*` environment variables ([`env`]), and
//! finally command-line flags.

pub mod env;
pub mod file;

use std::time::Duration;

use crate::render::{CellMetrics, Geometry};

/// Default playback speed.
pub const DEFAULT_SPEED: f64 = 1.0;

/// Default speed increment for faster/slower controls.
pub const DEFAULT_SPEED_STEP: f64 = 0.25;

/// Slowest allowed speed.
pub const MIN_SPEED: f64 = 0.1;

/// Fastest allowed speed.
pub const MAX_SPEED: f64 = 64.0;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Configuration for a playback engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Initial playback speed, restored on reset.
    pub speed: f64,

    /// Increment used by the faster/slower controls.
    pub speed_step: f64,

    /// Slowest allowed speed.
    pub min_speed: f64,

    /// Fastest allowed speed.
    pub max_speed: f64,

    /// Longest pause between two events, after speed scaling.
    ///
    /// `None` keeps recorded gaps as they are.
    pub max_idle: Option<Duration>,

    /// Terminal size applied on reset.
    pub initial_geometry: Geometry,

    /// Cell size used by renderers that do not measure their own.
    pub cell_metrics: CellMetrics,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            speed_step: DEFAULT_SPEED_STEP,
            min_speed: MIN_SPEED,
            max_speed: MAX_SPEED,
            max_idle: None,
            initial_geometry: Geometry::default(),
            cell_metrics: CellMetrics::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl PlaybackConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial speed.
    #[must_use]
    pub const fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set the speed step.
    #[must_use]
    pub const fn speed_step(mut self, step: f64) -> Self {
        self.speed_step = step;
        self
    }

    /// Set the speed bounds.
    #[must_use]
    pub const fn speed_range(mut self, min: f64, max: f64) -> Self {
        self.min_speed = min;
        self.max_speed = max;
        self
    }

    /// Cap gaps between events.
    #[must_use]
    pub const fn max_idle(mut self, max_idle: Option<Duration>) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the initial geometry.
    #[must_use]
    pub const fn initial_geometry(mut self, geometry: Geometry) -> Self {
        self.initial_geometry = geometry;
        self
    }

    /// Set the cell metrics.
    #[must_use]
    pub const fn cell_metrics(mut self, metrics: CellMetrics) -> Self {
        self.cell_metrics = metrics;
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Clamp a requested speed into the allowed range.
    ///
    /// NaN maps to the floor.
    #[must_use]
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if speed.is_nan() {
            return self.min_speed;
        }
        speed.clamp(self.min_speed, self.max_speed.max(self.min_speed))
    }

    /// Apply `TTYREPLAY_*` environment overrides.
    #[must_use]
    pub fn with_env(self) -> Self {
        env::EnvConfig::default().apply(self)
    }
}
