//! The locally controlled character

pub mod state;

pub use state::{handler, CharState, PlayerState};

use serde::{Deserialize, Serialize};

use crate::game::combat::{Attack, AttackType, DamageType, MobAttack, MobAttackResult};
use crate::game::input::{KeyAction, KeyInput, KeyState};
use crate::game::pet::{Pet, PetStance};
use crate::game::stats::{CharStats, StatId};
use crate::net::{DamageSource, Dispatch, Element, Movement, OutboundRecord};
use crate::physics::{Physics, PhysicsFlags, PhysicsObject};
use crate::terrain::{FootholdId, Ladder};
use crate::util::random::Roll;
use crate::util::time::{SimContext, TimedFlag, Timer};

use state::{NullState, FALL_DAMAGE_THRESHOLD};

pub const CLIMB_COOLDOWN_MS: i64 = 1000;
pub const PORTAL_COOLDOWN_MS: i64 = 1000;
pub const INVINCIBLE_MS: i64 = 2000;
/// Upward force of a jump-down hop
pub const JUMP_DOWN_FORCE: f64 = 1.5;
pub const MAX_PETS: usize = 3;

/// Layer a climbing character is drawn on
const CLIMB_LAYER: u8 = 7;

/// Cues for presentation; audio and effects are handled elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    Jump,
    Damaged { amount: i32 },
    Attack { attack_type: AttackType },
}

/// Passive HP/MP regeneration on a wall-clock interval
#[derive(Debug, Clone)]
pub struct Recovery {
    timer: Timer,
    rate: f32,
}

impl Recovery {
    pub const INTERVAL_MS: u64 = 10_000;
    const HP: f32 = 10.0;
    const MP: f32 = 3.0;

    pub fn new(rate: f32) -> Self {
        Self::with_interval(Self::INTERVAL_MS, rate)
    }

    pub fn with_interval(millis: u64, rate: f32) -> Self {
        Self {
            timer: Timer::new(millis).start(),
            rate,
        }
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    /// Amounts recovered, once per elapsed interval
    pub fn poll(&mut self) -> Option<(i32, i32)> {
        if !self.timer.is_ready() {
            return None;
        }
        self.timer.reset();
        Some(((Self::HP * self.rate) as i32, (Self::MP * self.rate) as i32))
    }
}

pub struct Player {
    id: i32,
    phobj: PhysicsObject,
    pub stats: CharStats,
    state: CharState,
    facing_right: bool,

    attacking: bool,
    attack_timer: TimedFlag,
    keys: KeyState,

    ladder: Option<Ladder>,
    underwater: bool,
    /// Highest point (smallest y) of the current fall
    fall_apex: f64,

    climb_cooldown: TimedFlag,
    portal_cooldown: TimedFlag,
    invincible: TimedFlag,
    recovery: Recovery,

    last_move: Movement,
    pets: [Option<Pet>; MAX_PETS],
    /// Skill bound to the skill key; 0 when none
    pub skill_id: i32,

    outbox: Vec<OutboundRecord>,
    events: Vec<PlayerEvent>,
}

impl Player {
    pub fn new(id: i32, stats: CharStats) -> Self {
        let mut phobj = PhysicsObject::default();
        phobj.on_ground = false;

        Self {
            id,
            phobj,
            stats,
            state: CharState::Stand,
            facing_right: true,
            attacking: false,
            attack_timer: TimedFlag::default(),
            keys: KeyState::default(),
            ladder: None,
            underwater: false,
            fall_apex: 0.0,
            climb_cooldown: TimedFlag::default(),
            portal_cooldown: TimedFlag::default(),
            invincible: TimedFlag::default(),
            recovery: Recovery::new(1.0),
            last_move: Movement::default(),
            pets: [None, None, None],
            skill_id: 0,
            outbox: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn phobj(&self) -> &PhysicsObject {
        &self.phobj
    }

    pub fn phobj_mut(&mut self) -> &mut PhysicsObject {
        &mut self.phobj
    }

    pub fn position(&self) -> (i32, i32) {
        self.phobj.position()
    }

    pub fn state(&self) -> CharState {
        self.state
    }

    pub fn stance_byte(&self) -> u8 {
        self.state.stance_byte(self.facing_right)
    }

    pub fn is_facing_right(&self) -> bool {
        self.facing_right
    }

    pub fn is_attacking(&self) -> bool {
        self.attacking
    }

    pub fn is_key_down(&self, action: KeyAction) -> bool {
        self.keys.is_down(action)
    }

    pub fn is_climbing(&self) -> bool {
        self.ladder.is_some()
    }

    pub fn ladder(&self) -> Option<&Ladder> {
        self.ladder.as_ref()
    }

    pub fn is_underwater(&self) -> bool {
        self.underwater
    }

    pub fn set_underwater(&mut self, underwater: bool) {
        self.underwater = underwater;
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible.is_set()
    }

    pub fn can_climb(&self) -> bool {
        !self.climb_cooldown.is_set()
    }

    pub fn can_use_portal(&self) -> bool {
        !self.portal_cooldown.is_set() && !self.attacking
    }

    pub fn set_recovery(&mut self, recovery: Recovery) {
        self.recovery = recovery;
    }

    pub fn set_recovery_rate(&mut self, rate: f32) {
        self.recovery.set_rate(rate);
    }

    /// Enter a state unless an attack is in progress
    pub fn set_state(&mut self, state: CharState) {
        if self.attacking {
            return;
        }
        self.state = state;
        handler(state).initialize(self);
    }

    pub fn set_direction(&mut self, right: bool) {
        if self.attacking {
            return;
        }
        self.facing_right = right;
    }

    /// Apply a key press or release
    pub fn send_action(&mut self, input: KeyInput) {
        self.keys.set(input.action, input.pressed);
        handler(self.state).send_action(self, input.action, input.pressed);
    }

    /// Advance one tick and flush queued records to `dispatcher`
    pub fn update(&mut self, physics: &Physics, ctx: &SimContext, dispatcher: &mut dyn Dispatch) {
        let owner = self.phobj.position();
        let current = handler(self.state);

        current.update(self);
        physics.move_object(&mut self.phobj);

        if self.attacking {
            self.attack_timer.update(ctx);
        }
        if self.attacking && !self.attack_timer.is_set() {
            self.attacking = false;
            self.phobj.flags.remove(PhysicsFlags::TURN_AT_EDGES);
            NullState.update_state(self, physics);
        } else {
            current.update_state(self, physics);
        }

        self.climb_cooldown.update(ctx);
        self.portal_cooldown.update(ctx);
        self.invincible.update(ctx);

        if !self.stats.is_dead() {
            if let Some((hp, mp)) = self.recovery.poll() {
                self.stats.heal(hp, mp);
                self.outbox.push(OutboundRecord::HpMpChange { hp, mp });
            }
        }

        self.update_pets(physics, owner);

        let movement = self.movement(ctx.timestep_ms);
        if self.last_move.has_moved(&movement) {
            self.outbox.push(OutboundRecord::PlayerMoved { movement });
            self.last_move = movement;
        }

        self.flush(dispatcher);
    }

    fn movement(&self, duration_ms: u16) -> Movement {
        Movement {
            command: Movement::ABSOLUTE,
            x: self.phobj.get_x(),
            y: self.phobj.get_y(),
            last_x: self.phobj.get_last_x(),
            last_y: self.phobj.get_last_y(),
            fh: self.phobj.fh_id.0,
            stance: self.stance_byte(),
            duration_ms: duration_ms as i16,
        }
    }

    /// Queue a record for the next flush
    pub fn queue(&mut self, record: OutboundRecord) {
        self.outbox.push(record);
    }

    pub fn flush(&mut self, dispatcher: &mut dyn Dispatch) {
        for record in self.outbox.drain(..) {
            dispatcher.send_or_log(record);
        }
    }

    pub fn push_event(&mut self, event: PlayerEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn jump(&mut self) {
        self.events.push(PlayerEvent::Jump);
        self.phobj.v_force = -self.stats.jump_force();
    }

    /// Drop through the current foothold
    pub fn jump_down(&mut self) {
        if self.attacking {
            return;
        }
        self.phobj.h_speed = 0.0;
        self.phobj.jumping_down_from = self.phobj.fh_id;
        self.phobj.set_y(self.phobj.ground_below_y);
        self.phobj.v_force = -JUMP_DOWN_FORCE;
        self.set_state(CharState::Fall);
    }

    /// Landing damage after falling `height` pixels
    pub fn fall_damage(&mut self, height: f64) -> i32 {
        let amount = (0.035 * (height - FALL_DAMAGE_THRESHOLD) + 7.0) as i32;
        self.stats.take_damage(amount);

        self.phobj.h_speed = if self.facing_right { 2.5 } else { -2.5 };
        self.phobj.v_force -= 2.0;

        self.events.push(PlayerEvent::Damaged { amount });
        self.outbox.push(OutboundRecord::TakeDamage {
            from: DamageSource::Environment,
            element: Element::Physical,
            amount,
            mob_id: 0,
            oid: 0,
            direction: u8::from(!self.facing_right),
        });
        amount
    }

    /// Take a hit from a mob; `None` while invincible
    pub fn damage(&mut self, attack: &MobAttack, rng: &mut dyn Roll) -> Option<MobAttackResult> {
        if self.invincible.is_set() {
            return None;
        }

        let damage = self.stats.mitigate(attack.watk).max(0);
        let pushed_left = attack.origin.0 > self.phobj.get_x();
        let missed = damage == 0;
        let immovable = self.ladder.is_some() || self.state == CharState::Died;

        if !missed && !immovable && rng.above(self.stats.stance) {
            self.phobj.h_speed = if pushed_left { -1.75 } else { 1.75 };
            let lift = self.phobj.v_speed + self.phobj.v_force;
            if lift > -1.8 {
                self.phobj.v_force += -1.8 - lift;
            }
        }

        if !missed {
            self.stats.take_damage(damage);
            self.invincible.set_for(INVINCIBLE_MS);
            self.events.push(PlayerEvent::Damaged { amount: damage });
        }

        Some(MobAttackResult {
            attack: *attack,
            damage,
            direction: u8::from(!pushed_left),
        })
    }

    pub fn can_attack(&self) -> bool {
        !self.attacking
            && !self.state.is_climbing()
            && !matches!(self.state, CharState::Sit | CharState::Died)
    }

    /// Build an attack from current stats, weapon and stance
    pub fn prepare_attack(&self, skill: bool) -> Attack {
        let (attack_type, degenerate) = if self.state == CharState::Prone {
            (AttackType::Close, true)
        } else if self.stats.weapon.uses_projectiles() {
            if self.stats.has_projectiles {
                (AttackType::Ranged, false)
            } else {
                (AttackType::Close, true)
            }
        } else if self.stats.weapon.is_magic() {
            if skill {
                (AttackType::Magic, false)
            } else {
                (AttackType::Close, true)
            }
        } else {
            (AttackType::Close, false)
        };

        let divisor = if degenerate { 10.0 } else { 1.0 };

        Attack {
            damage_type: if attack_type == AttackType::Magic {
                DamageType::Magic
            } else {
                DamageType::Weapon
            },
            attack_type,
            min_damage: self.stats.min_damage / divisor,
            max_damage: self.stats.max_damage / divisor,
            accuracy: self.stats.accuracy,
            critical: self.stats.critical,
            ignore_defense: self.stats.ignore_defense,
            origin: self.position(),
            to_left: !self.facing_right,
            speed: self.stats.attack_speed,
            player_level: self.stats.level,
            skill: if skill { self.skill_id } else { 0 },
            stance: self.stance_byte(),
            ..Default::default()
        }
    }

    /// Latch the attack animation; state changes wait until it ends
    pub fn start_attack(&mut self, attack: &Attack) {
        self.attacking = true;
        self.attack_timer.set_for(self.stats.attack_duration_ms());
        self.events.push(PlayerEvent::Attack {
            attack_type: attack.attack_type,
        });
    }

    /// Dash towards `target_x`, stopping at foothold edges
    pub fn rush(&mut self, target_x: f64, timestep_ms: u16) {
        if !self.phobj.on_ground {
            return;
        }
        let delay = self.stats.attack_duration_ms().clamp(1, u16::MAX as i64) as u16;
        self.phobj.move_x_until(target_x, delay, timestep_ms);
        self.phobj.flags.insert(PhysicsFlags::TURN_AT_EDGES);
    }

    /// Ask the server to raise a stat; false without points to spend
    pub fn spend_ap(&mut self, stat: StatId) -> bool {
        if self.stats.ap == 0 {
            return false;
        }
        self.outbox.push(OutboundRecord::SpendAp { stat });
        true
    }

    pub fn set_ladder(&mut self, ladder: Ladder) {
        if self.attacking {
            return;
        }
        self.ladder = Some(ladder);
        self.phobj.set_x(ladder.x as f64);
        self.phobj.h_speed = 0.0;
        self.phobj.v_speed = 0.0;
        self.phobj.fh_layer = CLIMB_LAYER;
        self.set_state(if ladder.is_ladder {
            CharState::Ladder
        } else {
            CharState::Rope
        });
    }

    /// Let go of the ladder and start the climb cooldown
    pub fn release_ladder(&mut self) {
        self.ladder = None;
        self.climb_cooldown.set_for(CLIMB_COOLDOWN_MS);
    }

    /// Place the player at a point and re-derive state from scratch
    pub fn respawn(&mut self, x: f64, y: f64, physics: &Physics) {
        self.phobj.set_position(x, y);
        self.phobj.reset_movement();
        self.phobj.fh_id = FootholdId::NONE;
        self.phobj.on_ground = false;
        self.keys.clear();
        self.attacking = false;
        self.attack_timer.clear();
        self.ladder = None;

        physics.tree().update_current_foothold(&mut self.phobj);
        NullState.update_state(self, physics);
    }

    /// Move through a portal and start the portal cooldown
    pub fn teleport(&mut self, x: f64, y: f64, physics: &Physics) {
        self.respawn(x, y, physics);
        self.portal_cooldown.set_for(PORTAL_COOLDOWN_MS);
    }

    /// Put a pet in `slot`; slots past the last are ignored
    pub fn add_pet(&mut self, slot: usize, pet: Pet) {
        if let Some(entry) = self.pets.get_mut(slot) {
            *entry = Some(pet);
        }
    }

    pub fn remove_pet(&mut self, slot: usize) {
        if let Some(entry) = self.pets.get_mut(slot) {
            *entry = None;
        }
    }

    pub fn pets(&self) -> impl Iterator<Item = &Pet> {
        self.pets.iter().flatten()
    }

    fn update_pets(&mut self, physics: &Physics, owner: (i32, i32)) {
        let state = self.state;
        for pet in self.pets.iter_mut().flatten() {
            match state {
                CharState::Ladder | CharState::Rope => pet.set_stance(PetStance::Hang),
                CharState::Swim => pet.set_stance(PetStance::Fly),
                _ => {
                    if matches!(pet.stance(), PetStance::Hang | PetStance::Fly) {
                        pet.set_stance(PetStance::Stand);
                    }
                }
            }
            pet.update(physics, owner);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::net::RecordingDispatcher;
    use crate::terrain::tree::tests::flat_floor;
    use crate::util::random::ScriptedRoll;

    /// A player resting at (`x`, `y`) with state derived from the terrain
    pub(crate) fn player_on(physics: &Physics, x: f64, y: f64) -> Player {
        let mut player = Player::new(1, CharStats::default());
        player.respawn(x, y, physics);
        player
    }

    pub(crate) fn tick(player: &mut Player, physics: &Physics, out: &mut RecordingDispatcher) {
        player.update(physics, &SimContext::default(), out);
    }

    fn mob_attack(watk: i32, x: i32) -> MobAttack {
        MobAttack {
            watk,
            origin: (x, 500),
            mob_id: 100100,
            oid: 7,
        }
    }

    #[test]
    fn test_respawn_derives_state() {
        let physics = Physics::new(flat_floor());

        let standing = player_on(&physics, 300.0, 500.0);
        assert_eq!(standing.state(), CharState::Stand);
        assert!(standing.phobj().on_ground);

        let falling = player_on(&physics, 300.0, 350.0);
        assert_eq!(falling.state(), CharState::Fall);
    }

    #[test]
    fn test_damage_knocks_back_and_grants_invincibility() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 300.0, 500.0);

        // wdef 20: 100/2 + 100/20 - 20/2 = 45
        let mut rng = ScriptedRoll::new([0.5]);
        let result = player.damage(&mob_attack(100, 350), &mut rng).unwrap();
        assert_eq!(result.damage, 45);
        assert_eq!(result.direction, 0);
        assert_eq!(player.phobj().h_speed, -1.75);
        assert!((player.phobj().v_speed + player.phobj().v_force + 1.8).abs() < 1e-9);
        assert_eq!(player.stats.hp, 250 - 45);

        assert!(player.is_invincible());
        assert!(player.damage(&mob_attack(100, 350), &mut rng).is_none());

        let mut out = RecordingDispatcher::new();
        for _ in 0..(INVINCIBLE_MS / 8) {
            tick(&mut player, &physics, &mut out);
        }
        assert!(!player.is_invincible());
    }

    #[test]
    fn test_no_knockback_on_ladder() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 300.0, 450.0);
        player.set_ladder(Ladder {
            id: 1,
            x: 300,
            y1: 300,
            y2: 500,
            is_ladder: true,
        });

        let mut rng = ScriptedRoll::new([0.99]);
        let result = player.damage(&mob_attack(100, 250), &mut rng).unwrap();
        assert_eq!(result.direction, 1);
        assert_eq!(player.phobj().h_speed, 0.0);
        assert_eq!(rng.remaining(), 1);
    }

    #[test]
    fn test_attack_latch_suppresses_state_changes() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 300.0, 500.0);
        let mut out = RecordingDispatcher::new();

        let attack = player.prepare_attack(false);
        player.start_attack(&attack);
        assert!(!player.can_attack());

        player.send_action(KeyInput::press(KeyAction::Left));
        assert_eq!(player.state(), CharState::Stand);
        assert!(player.is_facing_right());

        let ticks = player.stats.attack_duration_ms() / 8 + 2;
        for _ in 0..ticks {
            tick(&mut player, &physics, &mut out);
        }

        assert!(!player.is_attacking());
        assert!(matches!(player.state(), CharState::Walk | CharState::Stand));
        assert!(!player.is_facing_right());
    }

    #[test]
    fn test_prepare_attack_by_weapon() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 300.0, 500.0);

        let close = player.prepare_attack(false);
        assert_eq!(close.attack_type, AttackType::Close);
        assert_eq!(close.max_damage, 45.0);
        assert_eq!(close.origin, (300, 500));
        assert!(!close.to_left);

        player.stats.weapon = crate::game::stats::WeaponType::Bow;
        let no_arrows = player.prepare_attack(false);
        assert_eq!(no_arrows.attack_type, AttackType::Close);
        assert_eq!(no_arrows.max_damage, 4.5);

        player.stats.has_projectiles = true;
        assert_eq!(player.prepare_attack(false).attack_type, AttackType::Ranged);

        player.stats.weapon = crate::game::stats::WeaponType::Wand;
        let spell = player.prepare_attack(true);
        assert_eq!(spell.attack_type, AttackType::Magic);
        assert_eq!(spell.damage_type, DamageType::Magic);
    }

    #[test]
    fn test_rush_stops_at_edge() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 900.0, 500.0);
        let mut out = RecordingDispatcher::new();

        player.rush(1500.0, 8);
        assert!(player.phobj().h_speed > 0.0);
        tick(&mut player, &physics, &mut out);
        for _ in 0..50 {
            tick(&mut player, &physics, &mut out);
        }
        assert!(player.phobj().current_x() <= 975.0);
    }

    #[test]
    fn test_movement_is_sent_only_on_change() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 300.0, 500.0);
        let mut out = RecordingDispatcher::new();

        for _ in 0..5 {
            tick(&mut player, &physics, &mut out);
        }
        let moved: Vec<_> = out
            .take()
            .into_iter()
            .filter(|r| matches!(r, OutboundRecord::PlayerMoved { .. }))
            .collect();
        assert_eq!(moved.len(), 1);

        player.send_action(KeyInput::press(KeyAction::Left));
        tick(&mut player, &physics, &mut out);
        assert!(out.records.iter().any(|r| matches!(
            r,
            OutboundRecord::PlayerMoved { movement } if movement.stance == 3
        )));
    }

    #[test]
    fn test_recovery_heals_and_dispatches() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 300.0, 500.0);
        player.stats.hp = 100;
        player.set_recovery(Recovery::with_interval(1, 2.0));
        let mut out = RecordingDispatcher::new();

        std::thread::sleep(std::time::Duration::from_millis(5));
        tick(&mut player, &physics, &mut out);

        assert_eq!(player.stats.hp, 120);
        assert!(out
            .records
            .contains(&OutboundRecord::HpMpChange { hp: 20, mp: 6 }));
    }

    #[test]
    fn test_pet_slots() {
        let physics = Physics::new(flat_floor());
        let mut player = player_on(&physics, 300.0, 500.0);

        player.add_pet(0, Pet::new(1, "a".to_string(), 300.0, 500.0));
        player.add_pet(3, Pet::new(2, "b".to_string(), 300.0, 500.0));
        assert_eq!(player.pets().count(), 1);

        player.remove_pet(9);
        player.remove_pet(0);
        assert_eq!(player.pets().count(), 0);
    }

    #[test]
    fn test_spend_ap_needs_points() {
        let mut player = Player::new(1, CharStats::default());
        assert!(!player.spend_ap(StatId::Strength));

        player.stats.ap = 2;
        assert!(player.spend_ap(StatId::Strength));
        let mut out = RecordingDispatcher::new();
        player.flush(&mut out);
        assert_eq!(
            out.records,
            vec![OutboundRecord::SpendAp {
                stat: StatId::Strength
            }]
        );
    }
}
