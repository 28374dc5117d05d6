//! Items and mesos lying on the map

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::game::combat::Rect;
use crate::physics::{MovementRegime, Physics, PhysicsObject};
use crate::util::interpolated::Linear;

/// Ticks a picked-up drop takes to fly off and fade
const PICKUP_TICKS: f64 = 48.0;
const OPACITY_STEP: f64 = 1.0 / PICKUP_TICKS;
const SPIN_STEP: f64 = 0.2;
const BOB_STEP: f64 = 0.025;
/// Drops hover this far above their resting point
const HOVER: f64 = 4.0;
const SIZE: i32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropState {
    /// Arcing from the source towards its resting point
    Dropped,
    /// Resting and bobbing in place
    Floating,
    /// Flying off and fading
    PickedUp,
}

/// What a looter looks like to a drop flying towards it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LooterView {
    pub x: f64,
    pub h_speed: f64,
}

#[derive(Debug, Clone)]
pub struct Drop {
    oid: i32,
    item_id: i32,
    meso: bool,
    owner: i32,
    player_drop: bool,

    phobj: PhysicsObject,
    state: DropState,
    dest: (i16, i16),
    base_y: f64,
    moved: f64,
    angle: Linear,
    opacity: Linear,

    looter: Option<i32>,
    active: bool,
}

impl Drop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        oid: i32,
        item_id: i32,
        meso: bool,
        owner: i32,
        start: (i16, i16),
        dest: (i16, i16),
        mode: u8,
        player_drop: bool,
    ) -> Self {
        let mut phobj = PhysicsObject::at(start.0 as f64, start.1 as f64 - HOVER);
        phobj.on_ground = false;

        let mut base_y = dest.1 as f64 - HOVER;
        let state = match mode {
            0 | 1 => {
                phobj.v_speed = -5.0;
                phobj.h_speed = (dest.0 - start.0) as f64 / PICKUP_TICKS;
                DropState::Dropped
            }
            2 => {
                base_y = phobj.current_y();
                phobj.regime = MovementRegime::Fixed;
                DropState::Floating
            }
            3 => {
                phobj.v_speed = -5.0;
                DropState::PickedUp
            }
            other => {
                warn!(oid, mode = other, "Unknown drop mode");
                base_y = phobj.current_y();
                phobj.regime = MovementRegime::Fixed;
                DropState::Floating
            }
        };

        Self {
            oid,
            item_id,
            meso,
            owner,
            player_drop,
            phobj,
            state,
            dest,
            base_y,
            moved: 0.0,
            angle: Linear::new(0.0),
            opacity: Linear::new(1.0),
            looter: None,
            active: true,
        }
    }

    pub fn oid(&self) -> i32 {
        self.oid
    }

    pub fn item_id(&self) -> i32 {
        self.item_id
    }

    pub fn is_meso(&self) -> bool {
        self.meso
    }

    pub fn owner(&self) -> i32 {
        self.owner
    }

    pub fn is_player_drop(&self) -> bool {
        self.player_drop
    }

    pub fn state(&self) -> DropState {
        self.state
    }

    pub fn phobj(&self) -> &PhysicsObject {
        &self.phobj
    }

    pub fn position(&self) -> (i32, i32) {
        self.phobj.position()
    }

    pub fn angle(&self) -> &Linear {
        &self.angle
    }

    pub fn opacity(&self) -> &Linear {
        &self.opacity
    }

    pub fn looter(&self) -> Option<i32> {
        self.looter
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn bounds(&self) -> Rect {
        let (x, y) = self.position();
        Rect::new(x, x + SIZE, y, y + SIZE)
    }

    /// Advance one tick; `looter` is the looter's motion when it is simulated here
    pub fn update(&mut self, physics: &Physics, looter: Option<LooterView>) {
        if !self.active {
            return;
        }

        physics.move_object(&mut self.phobj);

        if self.state == DropState::Dropped {
            if self.phobj.on_ground {
                self.phobj.h_speed = 0.0;
                self.phobj.regime = MovementRegime::Fixed;
                self.state = DropState::Floating;
                self.angle.set(0.0);
                self.phobj
                    .set_position(self.dest.0 as f64, self.dest.1 as f64 - HOVER);
            } else {
                self.angle.add(SPIN_STEP);
            }
        }

        if self.state == DropState::Floating {
            self.phobj
                .y
                .assign(self.base_y + 5.0 + (self.moved.cos() - 1.0) * 2.5);
            self.moved = if self.moved < 360.0 {
                self.moved + BOB_STEP
            } else {
                0.0
            };
        }

        if self.state == DropState::PickedUp {
            if let Some(view) = looter {
                let hdelta = view.x - self.phobj.current_x();
                self.phobj.h_speed = view.h_speed / 2.0 + (hdelta - 16.0) / PICKUP_TICKS;
            }

            self.opacity.add(-OPACITY_STEP);
            if self.opacity.last() <= OPACITY_STEP {
                self.opacity.set(1.0);
                self.active = false;
            }
        }
    }

    /// 0 fades out, 1 vanishes, 2 flies to `looter`
    pub fn expire(&mut self, mode: u8, looter: Option<i32>) {
        match mode {
            0 => self.state = DropState::PickedUp,
            1 => self.active = false,
            2 => {
                self.angle.set(0.0);
                self.state = DropState::PickedUp;
                self.looter = looter;
                self.phobj.v_speed = -4.5;
                self.phobj.regime = MovementRegime::Normal;
            }
            other => {
                warn!(oid = self.oid, mode = other, "Unknown drop expire mode");
                self.active = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::tree::tests::flat_floor;
    use approx::assert_relative_eq;

    fn spawn(mode: u8) -> Drop {
        Drop::new(9, 2000000, false, 1, (400, 450), (496, 500), mode, false)
    }

    #[test]
    fn test_dropped_item_spins_then_rests() {
        let physics = Physics::new(flat_floor());
        let mut drop = spawn(0);
        assert_eq!(drop.state(), DropState::Dropped);
        assert_relative_eq!(drop.phobj().h_speed, 2.0);

        drop.update(&physics, None);
        assert_relative_eq!(drop.angle().get(), SPIN_STEP);

        for _ in 0..200 {
            drop.update(&physics, None);
            if drop.state() == DropState::Floating {
                break;
            }
        }
        assert_eq!(drop.state(), DropState::Floating);
        assert_eq!(drop.position().0, 496);
        assert_eq!(drop.phobj().regime, MovementRegime::Fixed);
    }

    #[test]
    fn test_floating_drop_bobs() {
        let physics = Physics::new(flat_floor());
        let mut drop = spawn(2);
        let base = drop.phobj().current_y();

        drop.update(&physics, None);
        assert_relative_eq!(drop.phobj().current_y(), base + 5.0);

        for _ in 0..60 {
            drop.update(&physics, None);
        }
        let y = drop.phobj().current_y();
        assert!(y < base + 5.0 && y >= base);
    }

    #[test]
    fn test_picked_up_drop_fades_out() {
        let physics = Physics::new(flat_floor());
        let mut drop = spawn(2);
        drop.expire(2, Some(1));
        assert_eq!(drop.state(), DropState::PickedUp);
        assert_eq!(drop.looter(), Some(1));

        let looter = LooterView {
            x: 600.0,
            h_speed: 0.0,
        };
        drop.update(&physics, Some(looter));
        assert!(drop.phobj().h_speed > 0.0);

        for _ in 0..60 {
            drop.update(&physics, Some(looter));
        }
        assert!(!drop.is_active());
    }

    #[test]
    fn test_expire_vanishes() {
        let mut drop = spawn(0);
        drop.expire(1, None);
        assert!(!drop.is_active());
    }
}
