//! Environment-based configuration.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use super::PlaybackConfig;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "TTYREPLAY";

/// Variable names understood by [`EnvConfig::apply`], without the prefix.
pub mod vars {
    /// Initial playback speed.
    pub const SPEED: &str = "SPEED";
    /// Speed step for faster/slower.
    pub const SPEED_STEP: &str = "SPEED_STEP";
    /// Slowest allowed speed.
    pub const MIN_SPEED: &str = "MIN_SPEED";
    /// Longest gap between events, in milliseconds.
    pub const MAX_IDLE_MS: &str = "MAX_IDLE_MS";
    /// Log filter used when `RUST_LOG` is unset.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Values that take precedence over the process environment.
    overrides: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    /// Create a reader backed by fixed values instead of the process
    /// environment. Names are given without the prefix.
    #[must_use]
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (name, value) in values {
            let var_name = config.var_name(&name.into());
            config.overrides.insert(var_name, value.into());
        }
        config
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        self.overrides
            .get(&var_name)
            .cloned()
            .or_else(|| std::env::var(&var_name).ok())
    }

    /// Get a parsed value. Unparseable values are logged and ignored.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let value = self.get(name)?;
        let parsed = value.trim().parse().ok();
        if parsed.is_none() {
            warn!(variable = %self.var_name(name), %value, "ignoring unparseable value");
        }
        parsed
    }

    /// Get a duration in milliseconds.
    #[must_use]
    pub fn duration_millis(&self, name: &str) -> Option<Duration> {
        self.parse::<u64>(name).map(Duration::from_millis)
    }

    /// Overlay the variables that are set onto `config`.
    #[must_use]
    pub fn apply(&self, mut config: PlaybackConfig) -> PlaybackConfig {
        if let Some(speed) = self.parse(vars::SPEED) {
            config.speed = speed;
        }
        if let Some(step) = self.parse(vars::SPEED_STEP) {
            config.speed_step = step;
        }
        if let Some(min) = self.parse(vars::MIN_SPEED) {
            config.min_speed = min;
        }
        if let Some(max_idle) = self.duration_millis(vars::MAX_IDLE_MS) {
            config.max_idle = Some(max_idle);
        }
        if let Some(level) = self.get(vars::LOG_LEVEL) {
            config.log_level = level;
        }
        config
    }
}
