//! Movement integration for every simulated entity

pub mod integrator;
pub mod object;

pub use integrator::{constants, Physics};
pub use object::{MovementRegime, PhysicsFlags, PhysicsObject};
