//! Shared helpers: timing, interpolation, randomness

pub mod interpolated;
pub mod random;
pub mod time;
