//! Coarse-grained registration timer.
//!
//! Checked once per local tick from the main loop rather than run as a
//! scheduled task; when the accumulator crosses the interval it fires
//! exactly one registration action and resets.

/// Fixed-period accumulator timer.
#[derive(Debug, Clone)]
pub struct KeepaliveTimer {
    interval: f32,
    accumulator: f32,
}

impl KeepaliveTimer {
    /// Create a timer that fires every `interval` seconds.
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            accumulator: 0.0,
        }
    }

    /// Advance by `dt` seconds; returns `true` when the interval elapsed.
    ///
    /// Fires at most once per call: a long stall produces one firing,
    /// not a burst.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.accumulator += dt;
        if self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            // Clamp after a stall so the debt is not carried forward.
            if self.accumulator >= self.interval {
                self.accumulator = 0.0;
            }
            true
        } else {
            false
        }
    }
}
