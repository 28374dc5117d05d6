//! Per-frame presentation views of the simulation

use serde::{Deserialize, Serialize};

use crate::game::drop::{Drop, DropState};
use crate::game::mob::{Mob, MobStance};
use crate::game::pet::{Pet, PetStance};
use crate::game::player::{CharState, Player, PlayerEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub state: CharState,
    pub stance: u8,
    pub facing_right: bool,
    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
    pub attacking: bool,
    pub invincible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetView {
    pub item_id: i32,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub stance: PetStance,
    pub facing_right: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobView {
    pub oid: i32,
    pub mob_id: i32,
    pub x: f64,
    pub y: f64,
    pub stance: MobStance,
    pub facing_right: bool,
    pub opacity: f64,
    pub hp_bar: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropView {
    pub oid: i32,
    pub item_id: i32,
    pub meso: bool,
    pub x: f64,
    pub y: f64,
    pub state: DropState,
    pub angle: f64,
    pub opacity: f64,
}

/// Everything a renderer needs for one frame.
///
/// Positions are blended between the last two ticks by `alpha`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub tick: u64,
    pub alpha: f32,
    pub player: PlayerView,
    pub pets: Vec<PetView>,
    pub mobs: Vec<MobView>,
    pub drops: Vec<DropView>,
    pub events: Vec<PlayerEvent>,
}

impl PlayerView {
    fn new(player: &Player, alpha: f32) -> Self {
        let (x, y) = player.phobj().interpolated(alpha);
        Self {
            id: player.id(),
            x,
            y,
            state: player.state(),
            stance: player.stance_byte(),
            facing_right: player.is_facing_right(),
            hp: player.stats.hp,
            max_hp: player.stats.max_hp,
            mp: player.stats.mp,
            max_mp: player.stats.max_mp,
            attacking: player.is_attacking(),
            invincible: player.is_invincible(),
        }
    }
}

impl PetView {
    fn new(pet: &Pet, alpha: f32) -> Self {
        let (x, y) = pet.phobj().interpolated(alpha);
        Self {
            item_id: pet.item_id,
            name: pet.name.clone(),
            x,
            y,
            stance: pet.stance(),
            facing_right: pet.is_facing_right(),
        }
    }
}

impl MobView {
    fn new(mob: &Mob, alpha: f32) -> Self {
        let (x, y) = mob.phobj().interpolated(alpha);
        Self {
            oid: mob.oid(),
            mob_id: mob.data().id,
            x,
            y,
            stance: mob.stance(),
            facing_right: mob.is_facing_right(),
            opacity: mob.opacity().interpolate(alpha),
            hp_bar: mob.hp_bar(),
        }
    }
}

impl DropView {
    fn new(drop: &Drop, alpha: f32) -> Self {
        let (x, y) = drop.phobj().interpolated(alpha);
        Self {
            oid: drop.oid(),
            item_id: drop.item_id(),
            meso: drop.is_meso(),
            x,
            y,
            state: drop.state(),
            angle: drop.angle().interpolate(alpha),
            opacity: drop.opacity().interpolate(alpha),
        }
    }
}

/// Builds frame snapshots at a fixed tick interval
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to build a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    pub fn build<'a>(
        &self,
        tick: u64,
        alpha: f32,
        player: &Player,
        mobs: impl Iterator<Item = &'a Mob>,
        drops: impl Iterator<Item = &'a Drop>,
        events: Vec<PlayerEvent>,
    ) -> FrameSnapshot {
        FrameSnapshot {
            tick,
            alpha,
            player: PlayerView::new(player, alpha),
            pets: player.pets().map(|pet| PetView::new(pet, alpha)).collect(),
            mobs: mobs
                .filter(|mob| mob.is_active())
                .map(|mob| MobView::new(mob, alpha))
                .collect(),
            drops: drops
                .filter(|drop| drop.is_active())
                .map(|drop| DropView::new(drop, alpha))
                .collect(),
            events,
        }
    }
}
