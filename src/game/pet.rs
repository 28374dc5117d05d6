//! Pets following their owner

use serde::{Deserialize, Serialize};

use crate::physics::{MovementRegime, Physics, PhysicsFlags, PhysicsObject};

/// Horizontal force of a walking pet
const WALK_FORCE: f64 = 0.35;
/// Force of a flying pet on each axis
const FLY_FORCE: f64 = 0.2;
/// Pets farther than this from a walking owner jump to them
const WALK_LEASH: f64 = 150.0;
const FLY_LEASH: f64 = 250.0;
/// Horizontal slack before the pet starts following
const FOLLOW_SLACK: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetStance {
    #[default]
    Stand,
    Move,
    /// Clinging to an owner on a ladder or rope
    Hang,
    /// Following an owner through water or air
    Fly,
}

#[derive(Debug, Clone)]
pub struct Pet {
    pub item_id: i32,
    pub name: String,
    phobj: PhysicsObject,
    stance: PetStance,
    facing_right: bool,
}

impl Pet {
    pub fn new(item_id: i32, name: String, x: f64, y: f64) -> Self {
        let mut phobj = PhysicsObject::at(x, y);
        phobj.on_ground = false;
        Self {
            item_id,
            name,
            phobj,
            stance: PetStance::Stand,
            facing_right: true,
        }
    }

    pub fn stance(&self) -> PetStance {
        self.stance
    }

    pub fn set_stance(&mut self, stance: PetStance) {
        self.stance = stance;
    }

    pub fn is_facing_right(&self) -> bool {
        self.facing_right
    }

    pub fn position(&self) -> (i32, i32) {
        self.phobj.position()
    }

    pub fn phobj(&self) -> &PhysicsObject {
        &self.phobj
    }

    fn teleport(&mut self, owner: (i32, i32)) {
        self.phobj.set_position(owner.0 as f64, owner.1 as f64);
        self.phobj.reset_movement();
    }

    /// Follow the owner's settled position from the start of the tick
    pub fn update(&mut self, physics: &Physics, owner: (i32, i32)) {
        let (x, y) = self.phobj.position();
        let dx = owner.0 - x;
        let dy = owner.1 - y;
        let distance = (dx as f64).hypot(dy as f64);

        match self.stance {
            PetStance::Stand | PetStance::Move => {
                if distance > WALK_LEASH {
                    self.teleport(owner);
                } else if dx > FOLLOW_SLACK {
                    self.phobj.h_force = WALK_FORCE;
                    self.facing_right = true;
                    self.stance = PetStance::Move;
                } else if dx < -FOLLOW_SLACK {
                    self.phobj.h_force = -WALK_FORCE;
                    self.facing_right = false;
                    self.stance = PetStance::Move;
                } else {
                    self.phobj.h_force = 0.0;
                    self.stance = PetStance::Stand;
                }
                self.phobj.regime = MovementRegime::Normal;
                self.phobj.flags.remove(PhysicsFlags::NO_GRAVITY);
            }
            PetStance::Hang => {
                self.phobj.set_position(owner.0 as f64, owner.1 as f64);
                self.phobj.flags.insert(PhysicsFlags::NO_GRAVITY);
            }
            PetStance::Fly => {
                if distance > FLY_LEASH {
                    self.teleport(owner);
                } else {
                    self.phobj.h_force = if dx > FOLLOW_SLACK {
                        self.facing_right = true;
                        FLY_FORCE
                    } else if dx < -FOLLOW_SLACK {
                        self.facing_right = false;
                        -FLY_FORCE
                    } else {
                        0.0
                    };
                    self.phobj.v_force = if dy > FOLLOW_SLACK {
                        FLY_FORCE
                    } else if dy < -FOLLOW_SLACK {
                        -FLY_FORCE
                    } else {
                        0.0
                    };
                }
                self.phobj.regime = MovementRegime::Flying;
                self.phobj.flags.remove(PhysicsFlags::NO_GRAVITY);
            }
        }

        physics.move_object(&mut self.phobj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::tree::tests::flat_floor;

    #[test]
    fn test_far_pet_teleports() {
        let physics = Physics::new(flat_floor());
        let mut pet = Pet::new(5000000, "Kitty".to_string(), 100.0, 500.0);

        pet.update(&physics, (600, 500));
        assert_eq!(pet.position(), (600, 500));
    }

    #[test]
    fn test_map_wide_distance_teleports() {
        let physics = Physics::new(flat_floor());
        let mut pet = Pet::new(5000000, "Kitty".to_string(), -30000.0, 500.0);

        pet.update(&physics, (30000, 500));
        assert!(pet.position().0 > 0);
    }

    #[test]
    fn test_pet_walks_toward_owner() {
        let physics = Physics::new(flat_floor());
        let mut pet = Pet::new(5000000, "Kitty".to_string(), 400.0, 500.0);

        for _ in 0..20 {
            pet.update(&physics, (500, 500));
        }
        assert_eq!(pet.stance(), PetStance::Move);
        assert!(pet.is_facing_right());
        assert!(pet.position().0 > 400);
    }

    #[test]
    fn test_hanging_pet_sticks_to_owner() {
        let physics = Physics::new(flat_floor());
        let mut pet = Pet::new(5000000, "Kitty".to_string(), 480.0, 500.0);
        pet.set_stance(PetStance::Hang);

        pet.update(&physics, (500, 300));
        assert_eq!(pet.position(), (500, 300));
    }
}
