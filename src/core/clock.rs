//! Monotonic frame clock
//!
//! Supplies elapsed time in seconds to animation playback. The clock can be
//! advanced manually (deterministic stepping) or from wall time via `tick()`.

use std::time::{Duration, Instant};

/// Monotonic game clock measured in seconds.
#[derive(Debug, Clone)]
pub struct Clock {
    /// Total elapsed time in seconds
    elapsed: f64,
    /// Time advanced by the last step
    delta: f64,
    /// Number of steps taken
    frame: u64,
    /// Multiplier applied to every step
    time_scale: f64,
    /// When paused, steps are ignored
    paused: bool,
    /// Wall-time baseline for `tick()`
    last_instant: Option<Instant>,
    /// Upper clamp for wall-time deltas
    max_delta: Duration,
}

impl Clock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elapsed: 0.0,
            delta: 0.0,
            frame: 0,
            time_scale: 1.0,
            paused: false,
            last_instant: None,
            max_delta: Duration::from_millis(250),
        }
    }

    /// Advance the clock by `dt` seconds.
    ///
    /// Negative or non-finite deltas are ignored so elapsed time never goes
    /// backwards.
    pub fn advance(&mut self, dt: f64) {
        self.frame += 1;

        if self.paused || !dt.is_finite() || dt < 0.0 {
            self.delta = 0.0;
            return;
        }

        self.delta = dt * self.time_scale;
        self.elapsed += self.delta;
    }

    /// Advance the clock by the wall time since the previous `tick()`.
    ///
    /// The first tick only establishes the baseline. Long stalls are clamped
    /// to `max_delta`.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let dt = match self.last_instant {
            Some(last) => now.saturating_duration_since(last).min(self.max_delta),
            None => Duration::ZERO,
        };
        self.last_instant = Some(now);
        self.advance(dt.as_secs_f64());
        self.delta
    }

    /// Elapsed time in seconds.
    #[must_use]
    #[inline]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Time advanced by the last step, in seconds.
    #[must_use]
    #[inline]
    pub const fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of steps taken so far.
    #[must_use]
    #[inline]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Current time scale.
    #[must_use]
    pub const fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Set the time scale. Negative values are clamped to zero.
    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale.max(0.0);
    }

    /// Set the wall-time delta clamp used by `tick()`.
    pub fn set_max_delta(&mut self, max_delta: Duration) {
        self.max_delta = max_delta;
    }

    /// Stop time from advancing.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Let time advance again. The wall-time baseline is reset so the pause
    /// is not counted as one huge step.
    pub fn resume(&mut self) {
        self.paused = false;
        self.last_instant = None;
    }

    /// Check if the clock is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
