//! Time utilities for the simulation: fixed timestep context and polled timers

use std::time::{Duration, Instant};

/// Default simulation granularity in milliseconds (125 ticks per second)
pub const TIMESTEP_DEFAULT_MS: u16 = 8;

/// Explicit simulation context threaded through every tick.
///
/// Physics constants are expressed per tick of `TIMESTEP_DEFAULT_MS`; the
/// timestep here drives tick-based countdowns and the runner's interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimContext {
    /// Milliseconds advanced per tick
    pub timestep_ms: u16,
    /// Whether the simulation is paused
    pub paused: bool,
}

impl SimContext {
    pub fn new(timestep_ms: u16) -> Self {
        Self {
            timestep_ms: timestep_ms.max(1),
            paused: false,
        }
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.timestep_ms as u64)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new(TIMESTEP_DEFAULT_MS)
    }
}

/// Wall-clock timer polled each tick.
///
/// Inactive until started; once started, `is_ready` reports whether the
/// configured duration has elapsed since the last reset.
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
    duration: Duration,
    active: bool,
}

impl Timer {
    pub fn new(millis: u64) -> Self {
        Self {
            start: Instant::now(),
            duration: Duration::from_millis(millis),
            active: false,
        }
    }

    pub fn set_duration(&mut self, millis: u64) {
        self.duration = Duration::from_millis(millis);
    }

    pub fn start(mut self) -> Self {
        self.active = true;
        self
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_ready(&self) -> bool {
        self.active && self.start.elapsed() > self.duration
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A flag that stays set for a number of simulated milliseconds.
///
/// Counts down by the context timestep on every `update`, so cooldowns are
/// deterministic under a fixed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimedFlag {
    remaining_ms: i64,
}

impl TimedFlag {
    pub fn set_for(&mut self, millis: i64) {
        self.remaining_ms = millis.max(0);
    }

    pub fn clear(&mut self) {
        self.remaining_ms = 0;
    }

    pub fn update(&mut self, ctx: &SimContext) {
        if self.remaining_ms > 0 {
            self.remaining_ms = (self.remaining_ms - ctx.timestep_ms as i64).max(0);
        }
    }

    pub fn is_set(&self) -> bool {
        self.remaining_ms > 0
    }

    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms
    }
}
