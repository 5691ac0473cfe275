//! Monotonic frame clock.

use std::time::{Duration, Instant};

/// Frame timer reporting total and per-frame elapsed time.
///
/// Values only change on [`Timer::tick`], so every consumer of one frame
/// sees the same total and delta.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    total: Duration,
    delta: Duration,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            total: Duration::ZERO,
            delta: Duration::ZERO,
        }
    }

    /// Advance the clock by one frame and return the frame's delta.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        self.delta = now - self.last_tick;
        self.total = now - self.start;
        self.last_tick = now;
        self.delta
    }

    /// Seconds between `reset` (or creation) and the last tick.
    pub fn total_secs(&self) -> f32 {
        self.total.as_secs_f32()
    }

    /// Seconds between the last two ticks.
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_timer_reports_zero() {
        let timer = Timer::new();
        assert_eq!(timer.total_secs(), 0.0);
        assert_eq!(timer.delta_secs(), 0.0);
    }

    #[test]
    fn test_tick_accumulates_total() {
        let mut timer = Timer::new();
        thread::sleep(Duration::from_millis(5));
        let first = timer.tick();
        thread::sleep(Duration::from_millis(5));
        timer.tick();

        assert!(first >= Duration::from_millis(5));
        assert!(timer.delta_secs() > 0.0);
        assert!(timer.total_secs() >= timer.delta_secs());
        assert!(timer.total_secs() >= 0.010);
    }

    #[test]
    fn test_reset_clears_time() {
        let mut timer = Timer::new();
        thread::sleep(Duration::from_millis(2));
        timer.tick();
        timer.reset();
        assert_eq!(timer.total_secs(), 0.0);
        assert_eq!(timer.delta_secs(), 0.0);
    }
}
