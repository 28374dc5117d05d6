//! Per-entity movement state mutated by the integrator and the terrain graph

use serde::{Deserialize, Serialize};

use crate::terrain::FootholdId;
use crate::util::interpolated::Linear;

/// Which acceleration model the integrator applies to an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementRegime {
    /// Ground-based movement with gravity while airborne
    #[default]
    Normal,
    /// Airborne after a jump or jump-down; converts landing impact into slide
    Falling,
    /// Free movement with linear drag
    Flying,
    /// Free movement with drag and reduced gravity
    Swimming,
    /// Anchored (ladders, ropes, resting drops); no integration
    Fixed,
}

bitflags::bitflags! {
    /// Behaviour flags for a physics object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PhysicsFlags: u8 {
        /// Gravity is not applied while airborne.
        const NO_GRAVITY = 1 << 0;
        /// Treat foothold chain ends as walls. Cleared on the collision so the
        /// owner can notice and turn around.
        const TURN_AT_EDGES = 1 << 1;
        /// Recompute jump-down availability on the next foothold update.
        const CHECK_BELOW = 1 << 2;
    }
}

/// Position and velocity of a simulated entity.
///
/// Forces are one-shot: the integrator consumes and zeroes them every tick.
#[derive(Debug, Clone, Default)]
pub struct PhysicsObject {
    pub x: Linear,
    pub y: Linear,
    pub h_speed: f64,
    pub v_speed: f64,
    pub h_force: f64,
    pub v_force: f64,
    pub h_acceleration: f64,
    pub v_acceleration: f64,

    pub regime: MovementRegime,
    pub flags: PhysicsFlags,

    /// Supporting foothold; `FootholdId::NONE` while airborne or unresolved
    pub fh_id: FootholdId,
    pub fh_slope: f64,
    pub fh_layer: u8,
    pub on_ground: bool,

    /// Foothold currently being dropped through
    pub jumping_down_from: FootholdId,
    pub jump_down_enabled: bool,
    /// Y just beneath the current ground, where a jump-down starts
    pub ground_below_y: f64,

    /// Velocity at the moment the object last hit the ground
    pub landing_impact: Option<(f64, f64)>,
}

impl PhysicsObject {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: Linear::new(x),
            y: Linear::new(y),
            on_ground: true,
            ..Default::default()
        }
    }

    pub fn current_x(&self) -> f64 {
        self.x.get()
    }

    pub fn current_y(&self) -> f64 {
        self.y.get()
    }

    pub fn next_x(&self) -> f64 {
        self.x.get() + self.h_speed
    }

    pub fn next_y(&self) -> f64 {
        self.y.get() + self.v_speed
    }

    pub fn get_x(&self) -> i32 {
        self.x.get().round() as i32
    }

    pub fn get_y(&self) -> i32 {
        self.y.get().round() as i32
    }

    pub fn get_last_x(&self) -> i32 {
        self.x.last().round() as i32
    }

    pub fn get_last_y(&self) -> i32 {
        self.y.last().round() as i32
    }

    pub fn position(&self) -> (i32, i32) {
        (self.get_x(), self.get_y())
    }

    /// Position blended between the previous and current tick.
    ///
    /// Read-only; an object that has not moved renders at its rounded spot.
    pub fn interpolated(&self, alpha: f32) -> (f64, f64) {
        let x = if self.x.normalized() {
            self.x.get().round()
        } else {
            self.x.interpolate(alpha)
        };
        let y = if self.y.normalized() {
            self.y.get().round()
        } else {
            self.y.interpolate(alpha)
        };
        (x, y)
    }

    pub fn set_x(&mut self, x: f64) {
        self.x.set(x);
    }

    pub fn set_y(&mut self, y: f64) {
        self.y.set(y);
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.set_x(x);
        self.set_y(y);
    }

    /// Stop horizontally at `x`
    pub fn limit_x(&mut self, x: f64) {
        self.x.assign(x);
        self.h_speed = 0.0;
    }

    /// Stop vertically at `y`
    pub fn limit_y(&mut self, y: f64) {
        self.y.assign(y);
        self.v_speed = 0.0;
    }

    /// Advance position by the settled velocity
    pub fn advance(&mut self) {
        self.x.add(self.h_speed);
        self.y.add(self.v_speed);
    }

    pub fn normalize(&mut self) {
        self.x.normalize();
        self.y.normalize();
    }

    /// Pick a horizontal speed that reaches `target` after `delay_ms`
    pub fn move_x_until(&mut self, target: f64, delay_ms: u16, timestep_ms: u16) {
        if delay_ms > 0 {
            let hdelta = target - self.current_x();
            self.h_speed = timestep_ms as f64 * hdelta / delay_ms as f64;
        }
    }

    /// Pick a vertical speed that reaches `target` after `delay_ms`
    pub fn move_y_until(&mut self, target: f64, delay_ms: u16, timestep_ms: u16) {
        if delay_ms > 0 {
            let vdelta = target - self.current_y();
            self.v_speed = timestep_ms as f64 * vdelta / delay_ms as f64;
        }
    }

    pub fn is_moving_horizontally(&self) -> bool {
        self.h_speed != 0.0
    }

    pub fn is_moving_vertically(&self) -> bool {
        self.v_speed != 0.0
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving_horizontally() || self.is_moving_vertically()
    }

    /// Drop all velocity, forces and jump-down state
    pub fn reset_movement(&mut self) {
        self.h_speed = 0.0;
        self.v_speed = 0.0;
        self.h_force = 0.0;
        self.v_force = 0.0;
        self.h_acceleration = 0.0;
        self.v_acceleration = 0.0;
        self.jumping_down_from = FootholdId::NONE;
        self.landing_impact = None;
        self.normalize();
    }
}
