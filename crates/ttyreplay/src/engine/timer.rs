//! The engine's single armed timer.

use std::time::Duration;

use tokio::time::Instant;

/// A delay armed at a known instant.
///
/// The engine holds at most one of these. Cancelling is dropping it; the
/// driver recomputes the deadline every time it waits, so a cancelled timer
/// can never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    armed_at: Instant,
    delay: Duration,
}

impl ArmedTimer {
    /// Arm `delay` starting at `armed_at`.
    #[must_use]
    pub const fn new(armed_at: Instant, delay: Duration) -> Self {
        Self { armed_at, delay }
    }

    /// Arm `delay` starting now.
    #[must_use]
    pub fn start(delay: Duration) -> Self {
        Self::new(Instant::now(), delay)
    }

    /// When the timer was armed.
    #[must_use]
    pub const fn armed_at(&self) -> Instant {
        self.armed_at
    }

    /// The full delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// When the timer fires.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.armed_at + self.delay
    }

    /// Time left at `now`, floored at zero.
    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.delay
            .saturating_sub(now.saturating_duration_since(self.armed_at))
    }

    /// Time left now.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }
}
