//! Wall-clock pacing for interactive runs.
//!
//! Drivers step the simulator at `100 ms / speed`, floored at 16 ms so a
//! very high speed degrades into "as fast as the floor allows" rather
//! than a busy spin.

use std::time::{Duration, Instant};

/// Base wall-clock interval between ticks at speed 1.0.
const BASE_TICK_MS: f64 = 100.0;

/// Minimum interval regardless of speed.
const MIN_TICK_MS: f64 = 16.0;

/// Paces tick execution against the wall clock.
#[derive(Debug)]
pub struct TickPacer {
    period: Duration,
    next_deadline: Instant,
}

impl TickPacer {
    /// Create a pacer for the given speed multiplier (values at or below
    /// zero fall back to real time).
    pub fn new(speed: f64) -> Self {
        let speed = if speed > 0.0 { speed } else { 1.0 };
        let period_ms = (BASE_TICK_MS / speed).max(MIN_TICK_MS);
        let period = Duration::from_secs_f64(period_ms / 1000.0);
        TickPacer {
            period,
            next_deadline: Instant::now() + period,
        }
    }

    /// The wall interval between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next tick is due. If the run has fallen behind,
    /// the deadline snaps to now so lag does not accumulate.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
            self.next_deadline += self.period;
        } else {
            self.next_deadline = now + self.period;
        }
    }
}
