//! Monsters: static data, AI moves and combat hooks

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::game::combat::{calculate_damage, Attack, DamageLine, DefenseStats, MobAttack, Rect};
use crate::net::{Dispatch, Movement, OutboundRecord};
use crate::physics::{MovementRegime, Physics, PhysicsFlags, PhysicsObject};
use crate::terrain::FootholdId;
use crate::util::interpolated::Linear;
use crate::util::random::Roll;
use crate::util::time::{SimContext, TimedFlag};

/// Ticks a controlled mob keeps its current move
const MOVE_TICKS: u16 = 200;
/// Counter value after a knockback, so HIT lasts a short while
const HIT_COUNTER: u16 = 170;
const JUMP_CHANCE: f64 = 0.25;
const JUMP_FORCE: f64 = 5.0;
const FADE_STEP: f64 = 0.025;
const SHOW_HP_MS: i64 = 2000;

/// Static description of a mob kind, shared by all its instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobData {
    pub id: i32,
    pub name: String,
    pub level: u16,
    pub watk: i32,
    pub matk: i32,
    pub wdef: i32,
    pub mdef: i32,
    pub accuracy: i16,
    pub avoid: i16,
    /// Minimum damage that knocks the mob back
    pub knockback: i32,
    pub speed: f64,
    pub fly_speed: f64,
    pub touch_damage: bool,
    pub undead: bool,
    pub no_flip: bool,
    pub can_jump: bool,
    pub can_fly: bool,
    pub can_move: bool,
    /// Length of the death animation
    pub die_ms: i64,
    /// Hit box relative to the mob's feet
    pub bounds: Rect,
}

impl Default for MobData {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            level: 1,
            watk: 10,
            matk: 10,
            wdef: 0,
            mdef: 0,
            accuracy: 10,
            avoid: 0,
            knockback: 1,
            speed: 0.0,
            fly_speed: 0.0,
            touch_damage: true,
            undead: false,
            no_flip: false,
            can_jump: false,
            can_fly: false,
            can_move: true,
            die_ms: 600,
            bounds: Rect::new(-30, 30, -50, 0),
        }
    }
}

impl MobData {
    /// Walking force per tick
    pub fn walk_force(&self) -> f64 {
        (self.speed + 100.0) * 0.001
    }

    pub fn fly_force(&self) -> f64 {
        (self.fly_speed + 100.0) * 0.0005
    }

    pub fn defense(&self) -> DefenseStats {
        DefenseStats {
            level: self.level,
            weapon_defense: self.wdef,
            magic_defense: self.mdef,
            avoid: self.avoid,
        }
    }
}

/// Mob kinds by id
#[derive(Debug, Clone, Default)]
pub struct MobCatalog {
    entries: HashMap<i32, Arc<MobData>>,
}

impl MobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<MobData> = serde_json::from_str(source)?;
        let mut catalog = Self::new();
        for data in entries {
            catalog.insert(data);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, data: MobData) {
        if self.entries.insert(data.id, Arc::new(data)).is_some() {
            debug!("Replaced mob data");
        }
    }

    pub fn get(&self, id: i32) -> Option<Arc<MobData>> {
        self.entries.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A walking mob and a flying one
    pub fn demo() -> Self {
        let mut catalog = Self::new();
        catalog.insert(MobData {
            id: 100100,
            name: "Snail".to_string(),
            level: 1,
            watk: 12,
            speed: -65.0,
            knockback: 1,
            ..Default::default()
        });
        catalog.insert(MobData {
            id: 2300100,
            name: "Stirge".to_string(),
            level: 18,
            watk: 65,
            wdef: 10,
            avoid: 15,
            fly_speed: 40.0,
            can_fly: true,
            knockback: 20,
            ..Default::default()
        });
        catalog
    }
}

/// Mob animations as numbered on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MobStance {
    Move = 2,
    Stand = 4,
    Jump = 6,
    Hit = 8,
    Die = 10,
}

impl MobStance {
    /// Wire byte: odd values face left
    pub fn value_of(self, facing_right: bool) -> u8 {
        let value = self as u8;
        if facing_right {
            value
        } else {
            value + 1
        }
    }

    /// Decode a stance byte into stance and facing
    pub fn from_byte(byte: u8) -> (Self, bool) {
        let facing_right = byte % 2 == 0;
        let base = if facing_right { byte } else { byte - 1 };
        let stance = match base {
            0 | 2 => Self::Move,
            4 => Self::Stand,
            6 => Self::Jump,
            8 => Self::Hit,
            10 => Self::Die,
            other => {
                warn!(stance = other, "Unknown mob stance");
                Self::Stand
            }
        };
        (stance, facing_right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlyDirection {
    #[default]
    Straight,
    Upwards,
    Downwards,
}

impl FlyDirection {
    const ALL: [FlyDirection; 3] = [Self::Straight, Self::Upwards, Self::Downwards];
}

#[derive(Debug, Clone)]
pub struct Mob {
    oid: i32,
    data: Arc<MobData>,
    phobj: PhysicsObject,
    stance: MobStance,
    facing_right: bool,
    fly_direction: FlyDirection,

    /// This client runs the mob's AI and reports its movement
    control: bool,
    aggro: bool,
    counter: u16,

    active: bool,
    dying: bool,
    dead: bool,
    fading: bool,
    fading_in: bool,
    opacity: Linear,
    die_timer: TimedFlag,

    hp_percent: u8,
    show_hp: TimedFlag,
}

impl Mob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        oid: i32,
        data: Arc<MobData>,
        control: bool,
        stance: u8,
        fh: u16,
        new_spawn: bool,
        position: (i16, i16),
        rng: &mut dyn Roll,
    ) -> Self {
        let mut phobj = PhysicsObject::at(position.0 as f64, position.1 as f64);
        phobj.fh_id = FootholdId(fh);
        phobj.on_ground = phobj.fh_id.is_some();
        phobj.flags.insert(PhysicsFlags::TURN_AT_EDGES);
        if data.can_fly {
            phobj.regime = MovementRegime::Flying;
        }

        let (stance, facing_right) = MobStance::from_byte(stance);

        let mut mob = Self {
            oid,
            data,
            phobj,
            stance,
            facing_right,
            fly_direction: FlyDirection::Straight,
            control,
            aggro: false,
            counter: 0,
            active: true,
            dying: false,
            dead: false,
            fading: false,
            fading_in: new_spawn,
            opacity: Linear::new(if new_spawn { 0.0 } else { 1.0 }),
            die_timer: TimedFlag::default(),
            hp_percent: 0,
            show_hp: TimedFlag::default(),
        };

        if mob.control && mob.stance == MobStance::Stand {
            mob.next_move(rng);
        }
        mob
    }

    pub fn oid(&self) -> i32 {
        self.oid
    }

    pub fn data(&self) -> &MobData {
        &self.data
    }

    pub fn phobj(&self) -> &PhysicsObject {
        &self.phobj
    }

    pub fn position(&self) -> (i32, i32) {
        self.phobj.position()
    }

    pub fn stance(&self) -> MobStance {
        self.stance
    }

    pub fn stance_byte(&self) -> u8 {
        self.stance.value_of(self.facing_right)
    }

    pub fn is_facing_right(&self) -> bool {
        self.facing_right
    }

    pub fn is_controlled(&self) -> bool {
        self.control
    }

    pub fn is_aggressive(&self) -> bool {
        self.aggro
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_alive(&self) -> bool {
        self.active && !self.dying
    }

    pub fn opacity(&self) -> &Linear {
        &self.opacity
    }

    /// HP bar percent while it is shown
    pub fn hp_bar(&self) -> Option<u8> {
        (self.show_hp.is_set() && !self.dying && self.hp_percent > 0).then_some(self.hp_percent)
    }

    /// 0 passive, 1 controlled, 2 controlled and aggressive
    pub fn set_control(&mut self, mode: i8) {
        self.control = mode > 0;
        self.aggro = mode == 2;
    }

    fn set_stance(&mut self, stance: MobStance) {
        self.stance = stance;
    }

    /// Advance one tick; controlled mobs report their moves to `dispatcher`
    pub fn update(
        &mut self,
        physics: &Physics,
        ctx: &SimContext,
        rng: &mut dyn Roll,
        dispatcher: &mut dyn Dispatch,
    ) {
        if !self.active {
            return;
        }

        if self.stance == MobStance::Die {
            self.die_timer.update(ctx);
            if !self.die_timer.is_set() {
                self.dead = true;
            }
        }

        if self.fading {
            self.opacity.add(-FADE_STEP);
            if self.opacity.get() < FADE_STEP {
                self.opacity.set(0.0);
                self.fading = false;
                self.dead = true;
            }
        } else if self.fading_in {
            self.opacity.add(FADE_STEP);
            if self.opacity.get() > 1.0 - FADE_STEP {
                self.opacity.set(1.0);
                self.fading_in = false;
            }
        }

        if self.dead {
            self.active = false;
            return;
        }

        self.show_hp.update(ctx);

        if self.dying {
            self.phobj.normalize();
            physics.tree().update_current_foothold(&mut self.phobj);
            return;
        }

        if !self.data.can_fly && !self.phobj.flags.contains(PhysicsFlags::TURN_AT_EDGES) {
            self.facing_right = !self.facing_right;
            self.phobj.flags.insert(PhysicsFlags::TURN_AT_EDGES);
            if self.stance == MobStance::Hit {
                self.set_stance(MobStance::Stand);
            }
        }

        match self.stance {
            MobStance::Move => {
                if self.data.can_fly {
                    let force = self.data.fly_force();
                    self.phobj.h_force = if self.facing_right { force } else { -force };
                    match self.fly_direction {
                        FlyDirection::Upwards => self.phobj.v_force = -force,
                        FlyDirection::Downwards => self.phobj.v_force = force,
                        FlyDirection::Straight => {}
                    }
                } else {
                    let force = self.data.walk_force();
                    self.phobj.h_force = if self.facing_right { force } else { -force };
                }
            }
            MobStance::Hit => {
                if self.data.can_move {
                    let force = if self.phobj.on_ground { 0.2 } else { 0.1 };
                    self.phobj.h_force = if self.facing_right { -force } else { force };
                }
            }
            MobStance::Jump => self.phobj.v_force = -JUMP_FORCE,
            MobStance::Stand | MobStance::Die => {}
        }

        physics.move_object(&mut self.phobj);

        if self.control {
            self.counter += 1;
            let next = match self.stance {
                MobStance::Hit => self.counter > MOVE_TICKS,
                MobStance::Jump => self.phobj.on_ground,
                _ => self.counter > MOVE_TICKS,
            };

            if next {
                self.next_move(rng);
                self.update_movement(dispatcher);
                self.counter = 0;
            }
        }
    }

    fn next_move(&mut self, rng: &mut dyn Roll) {
        if !self.data.can_move {
            self.set_stance(MobStance::Stand);
            return;
        }

        match self.stance {
            MobStance::Hit | MobStance::Stand => {
                self.set_stance(MobStance::Move);
                self.facing_right = rng.next_bool();
            }
            MobStance::Move | MobStance::Jump => {
                if self.data.can_jump && self.phobj.on_ground && rng.below(JUMP_CHANCE) {
                    self.set_stance(MobStance::Jump);
                } else {
                    match rng.next_int(0, 2) {
                        0 => self.set_stance(MobStance::Stand),
                        1 => {
                            self.set_stance(MobStance::Move);
                            self.facing_right = false;
                        }
                        _ => {
                            self.set_stance(MobStance::Move);
                            self.facing_right = true;
                        }
                    }
                }
            }
            MobStance::Die => {}
        }

        if self.stance == MobStance::Move && self.data.can_fly {
            self.fly_direction = FlyDirection::ALL[rng.next_index(FlyDirection::ALL.len())];
        }
    }

    /// Report the mob's current movement to the server
    pub fn update_movement(&self, dispatcher: &mut dyn Dispatch) {
        let movement = Movement {
            command: Movement::ABSOLUTE,
            x: self.phobj.get_x(),
            y: self.phobj.get_y(),
            last_x: self.phobj.get_last_x(),
            last_y: self.phobj.get_last_y(),
            fh: self.phobj.fh_id.0,
            stance: self.stance_byte(),
            duration_ms: 0,
        };
        dispatcher.send_or_log(OutboundRecord::MobMoved {
            oid: self.oid,
            movement,
        });
    }

    /// Apply an authoritative position for a mob simulated elsewhere
    pub fn apply_remote_move(&mut self, x: i16, y: i16, stance: u8) {
        if self.control {
            return;
        }
        self.phobj.set_position(x as f64, y as f64);
        let (stance, facing_right) = MobStance::from_byte(stance);
        self.set_stance(stance);
        self.facing_right = facing_right;
    }

    /// Damage lines for each hit of `attack`
    pub fn calculate_damage(&self, rng: &mut dyn Roll, attack: &Attack) -> Vec<DamageLine> {
        calculate_damage(rng, &self.data.defense(), attack)
    }

    /// React to a landed hit; `to_left` is the direction the attack travels
    pub fn apply_damage(&mut self, damage: i32, to_left: bool, dispatcher: &mut dyn Dispatch) {
        if self.dying && self.stance != MobStance::Die {
            self.apply_death();
        } else if self.control && self.is_alive() && damage >= self.data.knockback {
            self.facing_right = to_left;
            self.counter = HIT_COUNTER;
            self.set_stance(MobStance::Hit);
            self.update_movement(dispatcher);
        }
    }

    /// Contact damage roll in `[0.8·watk, watk]`
    pub fn create_touch_attack(&self, rng: &mut dyn Roll) -> Option<MobAttack> {
        if !self.data.touch_damage {
            return None;
        }
        let min = (self.data.watk as f64 * 0.8) as i32;
        Some(MobAttack {
            watk: rng.next_int(min, self.data.watk),
            origin: self.position(),
            mob_id: self.data.id,
            oid: self.oid,
        })
    }

    fn apply_death(&mut self) {
        self.set_stance(MobStance::Die);
        self.die_timer.set_for(self.data.die_ms);
        self.dying = true;
    }

    /// 0 vanishes at once, 1 plays the death animation, 2 fades out
    pub fn kill(&mut self, animation: u8) {
        if !self.active {
            return;
        }
        match animation {
            0 => self.active = false,
            1 => self.apply_death(),
            2 => {
                self.fading = true;
                self.dying = true;
            }
            other => {
                warn!(oid = self.oid, animation = other, "Unknown kill animation");
                self.active = false;
            }
        }
    }

    pub fn show_hp(&mut self, percent: i8) {
        self.hp_percent = percent.clamp(0, 100) as u8;
        self.show_hp.set_for(SHOW_HP_MS);
    }

    /// Absolute hit box
    pub fn bounds(&self) -> Rect {
        let (x, y) = self.position();
        let b = self.data.bounds;
        Rect::new(b.left + x, b.right + x, b.top + y, b.bottom + y)
    }

    pub fn is_in_range(&self, range: &Rect) -> bool {
        self.active && range.overlaps(&self.bounds())
    }
}
