//! Seeded randomness for combat rolls and mob decisions

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform draws in `[0, 1)`.
///
/// Everything that consumes randomness in the simulation goes through this
/// trait so a fixed draw sequence yields fully determined outcomes.
pub trait Roll {
    fn next_unit(&mut self) -> f64;

    /// True when the draw falls below `chance`
    fn below(&mut self, chance: f64) -> bool {
        self.next_unit() < chance
    }

    /// True when the draw falls above `chance`
    fn above(&mut self, chance: f64) -> bool {
        self.next_unit() > chance
    }

    fn next_bool(&mut self) -> bool {
        self.below(0.5)
    }

    /// Uniform real in `[low, high]`; a degenerate range returns `low`
    fn next_real(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        low + (high - low) * self.next_unit()
    }

    /// Uniform index in `0..count`
    fn next_index(&mut self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        ((self.next_unit() * count as f64) as usize).min(count - 1)
    }

    /// Uniform integer in `[low, high]`
    fn next_int(&mut self, low: i32, high: i32) -> i32 {
        if high <= low {
            return low;
        }
        let span = (high - low) as usize + 1;
        low + self.next_index(span) as i32
    }
}

/// ChaCha-backed roll source seeded from configuration
#[derive(Debug, Clone)]
pub struct Randomizer {
    rng: ChaCha8Rng,
}

impl Randomizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Roll for Randomizer {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}

/// Replays a fixed sequence of draws, then repeats the last one.
///
/// Used to reproduce a recorded combat exchange exactly.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoll {
    draws: std::collections::VecDeque<f64>,
    last: f64,
}

impl ScriptedRoll {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            last: 0.0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl Roll for ScriptedRoll {
    fn next_unit(&mut self) -> f64 {
        if let Some(draw) = self.draws.pop_front() {
            self.last = draw;
        }
        self.last
    }
}
