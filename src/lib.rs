//! Client-side simulation core for a 2D side-scrolling MMORPG.
//!
//! Terrain is a graph of foothold segments; characters, mobs, pets and drops
//! move over it with a fixed-step integrator. The local player runs a state
//! machine driven by key input, combat resolves through a seeded roll source,
//! and everything the server must hear about leaves through a single
//! dispatch capability.

pub mod config;
pub mod game;
pub mod net;
pub mod physics;
pub mod terrain;
pub mod util;
