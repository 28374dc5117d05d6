//! Fixed-step integration of physics objects against the terrain graph

use crate::terrain::FootholdTree;

use super::object::{MovementRegime, PhysicsFlags, PhysicsObject};

/// Per-tick physics constants, tuned for an 8 ms step
pub mod constants {
    pub const GRAVITY: f64 = 0.14;
    pub const SWIM_GRAVITY: f64 = 0.03;
    pub const FRICTION: f64 = 0.5;
    pub const SLOPE_FACTOR: f64 = 0.1;
    pub const GROUND_SLIP: f64 = 3.0;
    pub const FLY_FRICTION: f64 = 0.05;
    pub const SWIM_FRICTION: f64 = 0.08;
    /// Speeds below this collapse to zero when no force is applied
    pub const SPEED_EPSILON: f64 = 0.1;
    /// 670 px/s at the default step
    pub const TERMINAL_VELOCITY: f64 = 5.36;
    /// Upper bound for the slide produced by a sloped landing
    pub const MAX_SLIDE: f64 = 3.0;
}

use constants::*;

/// Moves objects one tick at a time over a map's footholds
#[derive(Debug, Clone, Default)]
pub struct Physics {
    tree: FootholdTree,
}

impl Physics {
    pub fn new(tree: FootholdTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &FootholdTree {
        &self.tree
    }

    /// Advance `obj` by one tick.
    ///
    /// Resolves the supporting foothold, applies the regime's acceleration,
    /// clamps against terrain, then adds velocity to position.
    pub fn move_object(&self, obj: &mut PhysicsObject) {
        self.tree.update_current_foothold(obj);

        match obj.regime {
            MovementRegime::Normal => {
                move_normal(obj);
                self.tree.limit_movement(obj);
            }
            MovementRegime::Falling => {
                move_falling(obj);
                self.tree.limit_movement(obj);
            }
            MovementRegime::Flying => {
                move_flying(obj);
                self.tree.limit_movement(obj);
            }
            MovementRegime::Swimming => {
                move_swimming(obj);
                self.tree.limit_movement(obj);
            }
            MovementRegime::Fixed => {}
        }

        obj.advance();
    }

    /// Y of the ground below a point
    pub fn ground_below(&self, x: f64, y: f64) -> f64 {
        self.tree.ground_below(x, y)
    }
}

fn apply_ground_friction(obj: &mut PhysicsObject) {
    if obj.h_acceleration == 0.0 && obj.h_speed.abs() < SPEED_EPSILON {
        obj.h_speed = 0.0;
    } else {
        let inertia = obj.h_speed / GROUND_SLIP;
        let slope = obj.fh_slope.clamp(-0.5, 0.5);
        obj.h_acceleration -= (FRICTION + SLOPE_FACTOR * (1.0 + slope * -inertia)) * inertia;
    }
}

fn consume_forces(obj: &mut PhysicsObject) {
    obj.h_force = 0.0;
    obj.v_force = 0.0;
    obj.h_speed += obj.h_acceleration;
    obj.v_speed += obj.v_acceleration;
}

fn clamp_terminal(obj: &mut PhysicsObject) {
    if obj.v_speed > TERMINAL_VELOCITY {
        obj.v_speed = TERMINAL_VELOCITY;
    }
}

fn move_normal(obj: &mut PhysicsObject) {
    obj.h_acceleration = 0.0;
    obj.v_acceleration = 0.0;

    if obj.on_ground {
        obj.v_acceleration += obj.v_force;
        obj.h_acceleration += obj.h_force;
        apply_ground_friction(obj);
        obj.landing_impact = None;
    } else if !obj.flags.contains(PhysicsFlags::NO_GRAVITY) {
        obj.v_acceleration += GRAVITY;
    }

    consume_forces(obj);
    clamp_terminal(obj);
}

/// Convert the stored landing velocity into slide along the slope.
///
/// The share of the impact that lies along the foothold tangent keeps
/// moving downhill; a flat landing produces no slide.
fn landing_slide(impact: (f64, f64), slope: f64) -> f64 {
    let (h, v) = impact;
    let speed = (h * h + v * v).sqrt();
    if speed == 0.0 {
        return 0.0;
    }

    let norm = (1.0 + slope * slope).sqrt();
    let tangential = (h + v * slope) / norm;
    let slide = v * slope / norm * (tangential.abs() / speed);
    slide.clamp(-MAX_SLIDE, MAX_SLIDE)
}

fn move_falling(obj: &mut PhysicsObject) {
    obj.h_acceleration = 0.0;
    obj.v_acceleration = 0.0;

    if obj.on_ground {
        if let Some(impact) = obj.landing_impact.take() {
            obj.h_speed += landing_slide(impact, obj.fh_slope);
        }
        obj.v_acceleration += obj.v_force;
        obj.h_acceleration += obj.h_force;
        apply_ground_friction(obj);
    } else {
        obj.h_acceleration += obj.h_force;
        obj.v_acceleration += obj.v_force;
        if !obj.flags.contains(PhysicsFlags::NO_GRAVITY) {
            obj.v_acceleration += GRAVITY;
        }
    }

    consume_forces(obj);
    clamp_terminal(obj);
}

fn apply_drag_axis(speed: &mut f64, acceleration: f64) {
    if acceleration == 0.0 && speed.abs() < SPEED_EPSILON {
        *speed = 0.0;
    } else {
        *speed += acceleration;
    }
}

fn move_flying(obj: &mut PhysicsObject) {
    obj.h_acceleration = obj.h_force - FLY_FRICTION * obj.h_speed;
    obj.v_acceleration = obj.v_force - FLY_FRICTION * obj.v_speed;
    obj.h_force = 0.0;
    obj.v_force = 0.0;

    apply_drag_axis(&mut obj.h_speed, obj.h_acceleration);
    apply_drag_axis(&mut obj.v_speed, obj.v_acceleration);
}

fn move_swimming(obj: &mut PhysicsObject) {
    obj.h_acceleration = obj.h_force - SWIM_FRICTION * obj.h_speed;
    obj.v_acceleration = obj.v_force - SWIM_FRICTION * obj.v_speed;
    if !obj.flags.contains(PhysicsFlags::NO_GRAVITY) {
        obj.v_acceleration += SWIM_GRAVITY;
    }
    obj.h_force = 0.0;
    obj.v_force = 0.0;

    apply_drag_axis(&mut obj.h_speed, obj.h_acceleration);
    apply_drag_axis(&mut obj.v_speed, obj.v_acceleration);
    clamp_terminal(obj);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::tree::tests::{flat_floor, record};
    use crate::terrain::FootholdId;
    use approx::assert_relative_eq;

    #[test]
    fn test_fall_clamps_to_terminal_velocity() {
        let physics = Physics::new(flat_floor());
        let mut obj = PhysicsObject::at(500.0, 210.0);

        let mut max_speed: f64 = 0.0;
        for _ in 0..500 {
            physics.move_object(&mut obj);
            max_speed = max_speed.max(obj.v_speed);
            if obj.on_ground {
                break;
            }
        }

        assert!(max_speed <= TERMINAL_VELOCITY);
        assert_relative_eq!(max_speed, TERMINAL_VELOCITY);
        assert_eq!(obj.get_y(), 500);
        assert_eq!(obj.fh_id, FootholdId(1));
    }

    #[test]
    fn test_walk_reaches_steady_speed() {
        let physics = Physics::new(flat_floor());
        let mut obj = PhysicsObject::at(100.0, 500.0);
        obj.fh_id = FootholdId(1);

        let force = 0.2;
        for _ in 0..200 {
            obj.h_force = force;
            physics.move_object(&mut obj);
        }

        assert_relative_eq!(obj.h_speed, 5.0 * force, epsilon = 1e-6);
        assert_eq!(obj.get_y(), 500);
        assert!(obj.on_ground);
    }

    #[test]
    fn test_slow_speed_snaps_to_zero() {
        let physics = Physics::new(flat_floor());
        let mut obj = PhysicsObject::at(100.0, 500.0);
        obj.fh_id = FootholdId(1);
        obj.h_speed = 0.05;

        physics.move_object(&mut obj);
        assert_eq!(obj.h_speed, 0.0);
        assert_eq!(obj.current_x(), 100.0);
    }

    #[test]
    fn test_forces_are_one_shot() {
        let physics = Physics::new(flat_floor());
        let mut obj = PhysicsObject::at(100.0, 500.0);
        obj.fh_id = FootholdId(1);
        obj.h_force = 1.0;

        physics.move_object(&mut obj);
        assert_eq!(obj.h_force, 0.0);
        assert_relative_eq!(obj.h_speed, 1.0);

        physics.move_object(&mut obj);
        assert!(obj.h_speed < 1.0);
    }

    #[test]
    fn test_fixed_moves_by_velocity_only() {
        let physics = Physics::new(flat_floor());
        let mut obj = PhysicsObject::at(300.0, 300.0);
        obj.regime = MovementRegime::Fixed;
        obj.fh_id = FootholdId(1);
        obj.v_speed = -1.5;
        obj.v_force = 10.0;

        physics.move_object(&mut obj);
        assert_relative_eq!(obj.current_y(), 298.5);
        assert_relative_eq!(obj.v_speed, -1.5);
    }

    #[test]
    fn test_flying_drag_decays() {
        let physics = Physics::new(flat_floor());
        let mut obj = PhysicsObject::at(300.0, 300.0);
        obj.regime = MovementRegime::Flying;
        obj.on_ground = false;
        obj.h_speed = 2.0;

        physics.move_object(&mut obj);
        assert_relative_eq!(obj.h_speed, 1.9);
        assert_eq!(obj.v_speed, 0.0);
    }

    #[test]
    fn test_landing_on_slope_slides_downhill() {
        // Descends to the right: positive slope in screen coordinates
        let tree = FootholdTree::build(&[record(1, 0, 300, 400, 500, 0, 0)]);
        let physics = Physics::new(tree);

        let mut obj = PhysicsObject::at(200.0, 380.0);
        obj.on_ground = false;
        obj.regime = MovementRegime::Falling;
        obj.v_speed = 4.0;

        for _ in 0..10 {
            physics.move_object(&mut obj);
            if obj.on_ground {
                break;
            }
        }
        physics.move_object(&mut obj);

        assert!(obj.on_ground);
        assert!(obj.h_speed > 0.0);
        assert!(obj.landing_impact.is_none());
    }

    #[test]
    fn test_flat_landing_has_no_slide() {
        assert_eq!(landing_slide((0.0, 5.0), 0.0), 0.0);
        assert!(landing_slide((0.0, 5.0), 0.5) > 0.0);
        assert!(landing_slide((0.0, 5.0), -0.5) < 0.0);
        assert!(landing_slide((0.0, 50.0), 10.0) <= MAX_SLIDE);
    }
}
