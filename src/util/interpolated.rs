//! Scalars that remember their previous-tick value for render interpolation

use serde::{Deserialize, Serialize};

/// A value with its previous-tick state.
///
/// Every assignment shifts the current value into `before`, so rendering can
/// blend the last two settled ticks with a sub-tick alpha without touching
/// simulation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    now: f64,
    before: f64,
}

impl Linear {
    pub fn new(value: f64) -> Self {
        Self {
            now: value,
            before: value,
        }
    }

    /// Set both values, discarding any pending interpolation
    pub fn set(&mut self, value: f64) {
        self.now = value;
        self.before = value;
    }

    /// Assign a new current value, keeping the old one for interpolation
    pub fn assign(&mut self, value: f64) {
        self.before = self.now;
        self.now = value;
    }

    pub fn add(&mut self, delta: f64) {
        self.assign(self.now + delta);
    }

    pub fn normalize(&mut self) {
        self.before = self.now;
    }

    pub fn normalized(&self) -> bool {
        self.before == self.now
    }

    pub fn get(&self) -> f64 {
        self.now
    }

    pub fn last(&self) -> f64 {
        self.before
    }

    pub fn interpolate(&self, alpha: f32) -> f64 {
        let alpha = alpha.clamp(0.0, 1.0) as f64;
        self.before + (self.now - self.before) * alpha
    }
}
