//! One map's worth of simulation: terrain, the local player, mobs and drops

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, warn};

use crate::game::combat::{AttackResult, MobDamage, Rect};
use crate::game::drop::{Drop, LooterView};
use crate::game::input::{KeyAction, KeyInput};
use crate::game::mob::{Mob, MobCatalog};
use crate::game::pet::Pet;
use crate::game::player::Player;
use crate::game::snapshot::{FrameSnapshot, SnapshotBuilder};
use crate::net::{DamageSource, Dispatch, Element, InboundEvent, OutboundRecord};
use crate::physics::Physics;
use crate::terrain::{Ladder, MapLayout, Portal};
use crate::util::random::Roll;
use crate::util::time::SimContext;

/// Body of a standing character relative to its feet
fn character_bounds((x, y): (i32, i32)) -> Rect {
    Rect::new(x - 15, x + 15, y - 60, y)
}

pub struct World {
    physics: Physics,
    ladders: Vec<Ladder>,
    portals: Vec<Portal>,
    catalog: MobCatalog,

    player: Player,
    mobs: BTreeMap<i32, Mob>,
    drops: BTreeMap<i32, Drop>,

    /// Applied at the start of the next tick
    inbound: VecDeque<InboundEvent>,
    keys: VecDeque<KeyInput>,

    rng: Box<dyn Roll + Send>,
    tick: u64,
    accumulator_ms: f64,
}

impl World {
    pub fn new(
        layout: &MapLayout,
        catalog: MobCatalog,
        mut player: Player,
        rng: Box<dyn Roll + Send>,
    ) -> Self {
        player.set_underwater(layout.swim);
        player.set_recovery_rate(layout.recovery_rate);

        Self {
            physics: Physics::new(layout.build_tree()),
            ladders: layout.ladders.clone(),
            portals: layout.portals.clone(),
            catalog,
            player,
            mobs: BTreeMap::new(),
            drops: BTreeMap::new(),
            inbound: VecDeque::new(),
            keys: VecDeque::new(),
            rng,
            tick: 0,
            accumulator_ms: 0.0,
        }
    }

    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn mob(&self, oid: i32) -> Option<&Mob> {
        self.mobs.get(&oid)
    }

    pub fn mobs(&self) -> impl Iterator<Item = &Mob> {
        self.mobs.values()
    }

    pub fn drop_item(&self, oid: i32) -> Option<&Drop> {
        self.drops.get(&oid)
    }

    pub fn drops(&self) -> impl Iterator<Item = &Drop> {
        self.drops.values()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Place the local player on the map
    pub fn spawn_player(&mut self, x: f64, y: f64) {
        self.player.respawn(x, y, &self.physics);
    }

    /// Buffer a server event for the next tick
    pub fn push_event(&mut self, event: InboundEvent) {
        self.inbound.push_back(event);
    }

    /// Buffer a key press or release for the next tick
    pub fn push_key(&mut self, input: KeyInput) {
        self.keys.push_back(input);
    }

    /// Run as many ticks as `elapsed_ms` covers; returns the leftover tick fraction
    pub fn advance(&mut self, elapsed_ms: f64, ctx: &SimContext, dispatcher: &mut dyn Dispatch) -> f32 {
        let step = ctx.timestep_ms as f64;
        if ctx.paused || step <= 0.0 {
            return 0.0;
        }

        self.accumulator_ms += elapsed_ms;
        while self.accumulator_ms >= step {
            self.update(ctx, dispatcher);
            self.accumulator_ms -= step;
        }
        (self.accumulator_ms / step) as f32
    }

    /// Advance everything by one tick
    pub fn update(&mut self, ctx: &SimContext, dispatcher: &mut dyn Dispatch) {
        if ctx.paused {
            return;
        }

        while let Some(event) = self.inbound.pop_front() {
            self.apply_event(event);
        }
        while let Some(input) = self.keys.pop_front() {
            self.handle_key(input, dispatcher);
        }

        let looter = LooterView {
            x: self.player.phobj().current_x(),
            h_speed: self.player.phobj().h_speed,
        };
        self.check_touch_attacks();

        self.player.update(&self.physics, ctx, dispatcher);

        for mob in self.mobs.values_mut() {
            mob.update(&self.physics, ctx, &mut *self.rng, dispatcher);
        }
        self.mobs.retain(|_, mob| mob.is_active());

        let player_id = self.player.id();
        for drop in self.drops.values_mut() {
            let view = (drop.looter() == Some(player_id)).then_some(looter);
            drop.update(&self.physics, view);
        }
        self.drops.retain(|_, drop| drop.is_active());

        self.tick += 1;
    }

    pub fn snapshot(&mut self, builder: &SnapshotBuilder, alpha: f32) -> FrameSnapshot {
        let events = self.player.take_events();
        builder.build(
            self.tick,
            alpha,
            &self.player,
            self.mobs.values(),
            self.drops.values(),
            events,
        )
    }

    fn apply_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::SpawnMob {
                oid,
                mob_id,
                x,
                y,
                fh,
                stance,
                control,
                new_spawn,
            } => {
                let Some(data) = self.catalog.get(mob_id) else {
                    warn!(oid, mob_id, "Spawn of unknown mob skipped");
                    return;
                };
                let mob = Mob::new(
                    oid,
                    data,
                    control,
                    stance,
                    fh,
                    new_spawn,
                    (x, y),
                    &mut *self.rng,
                );
                if self.mobs.insert(oid, mob).is_some() {
                    debug!(oid, "Mob respawned over existing object");
                }
            }
            InboundEvent::ControlMob { oid, control } => {
                if let Some(mob) = self.mobs.get_mut(&oid) {
                    mob.set_control(i8::from(control));
                }
            }
            InboundEvent::MoveMob { oid, x, y, stance } => {
                if let Some(mob) = self.mobs.get_mut(&oid) {
                    mob.apply_remote_move(x, y, stance);
                }
            }
            InboundEvent::KillMob { oid, animation } => {
                if let Some(mob) = self.mobs.get_mut(&oid) {
                    mob.kill(animation);
                }
            }
            InboundEvent::ShowMobHp { oid, percent } => {
                if let Some(mob) = self.mobs.get_mut(&oid) {
                    mob.show_hp(percent);
                }
            }
            InboundEvent::SpawnDrop {
                oid,
                item_id,
                meso,
                owner,
                start_x,
                start_y,
                dest_x,
                dest_y,
                mode,
                player_drop,
            } => {
                let drop = Drop::new(
                    oid,
                    item_id,
                    meso,
                    owner,
                    (start_x, start_y),
                    (dest_x, dest_y),
                    mode,
                    player_drop,
                );
                self.drops.insert(oid, drop);
            }
            InboundEvent::RemoveDrop { oid, mode, looter } => {
                if let Some(drop) = self.drops.get_mut(&oid) {
                    drop.expire(mode, looter);
                }
            }
            InboundEvent::SpawnPet {
                slot,
                item_id,
                name,
            } => {
                let (x, y) = self.player.position();
                self.player
                    .add_pet(slot as usize, Pet::new(item_id, name, x as f64, y as f64));
            }
            InboundEvent::RemovePet { slot } => self.player.remove_pet(slot as usize),
            InboundEvent::Teleport { x, y } => {
                self.player.respawn(x as f64, y as f64, &self.physics);
            }
            InboundEvent::SetRecoveryRate { rate } => self.player.set_recovery_rate(rate),
        }
    }

    fn handle_key(&mut self, input: KeyInput, dispatcher: &mut dyn Dispatch) {
        if input.pressed {
            match input.action {
                KeyAction::Up => {
                    if self.try_portal() {
                        return;
                    }
                    self.try_climb(true);
                }
                KeyAction::Down => {
                    self.try_climb(false);
                }
                KeyAction::Return => self.player_attack(false, dispatcher),
                KeyAction::Tab => self.use_skill(dispatcher),
                _ => {}
            }
        }
        self.player.send_action(input);
    }

    fn try_portal(&mut self) -> bool {
        if !self.player.can_use_portal() || !self.player.phobj().on_ground {
            return false;
        }
        let (x, y) = self.player.position();
        let Some(portal) = self.portals.iter().find(|p| p.in_range(x, y)).copied() else {
            return false;
        };
        self.player
            .teleport(portal.target_x as f64, portal.target_y as f64, &self.physics);
        true
    }

    fn try_climb(&mut self, upwards: bool) -> bool {
        if self.player.is_climbing() || !self.player.can_climb() || self.player.is_attacking() {
            return false;
        }
        let (x, y) = self.player.position();
        let Some(ladder) = self.ladders.iter().find(|l| l.in_range(x, y, upwards)).copied() else {
            return false;
        };
        self.player.set_ladder(ladder);
        true
    }

    fn use_skill(&mut self, dispatcher: &mut dyn Dispatch) {
        let skill_id = self.player.skill_id;
        if skill_id == 0 {
            debug!("No skill bound");
            return;
        }
        if !self.player.can_attack() {
            return;
        }
        self.player.queue(OutboundRecord::UseSkill { skill_id });
        self.player_attack(true, dispatcher);
    }

    /// Resolve an attack against the closest mobs in reach
    fn player_attack(&mut self, skill: bool, dispatcher: &mut dyn Dispatch) {
        if !self.player.can_attack() {
            return;
        }

        let attack = self.player.prepare_attack(skill);
        let reach = attack.reach();
        let origin_x = attack.origin.0;

        let mut targets: Vec<(i32, i32)> = self
            .mobs
            .values()
            .filter(|mob| mob.is_alive() && mob.is_in_range(&reach))
            .map(|mob| ((mob.position().0 - origin_x).abs(), mob.oid()))
            .collect();
        targets.sort_unstable();
        targets.truncate(attack.mob_count as usize);

        let mut result = AttackResult::new(&attack);
        for (_, oid) in targets {
            let Some(mob) = self.mobs.get_mut(&oid) else {
                continue;
            };
            let lines = mob.calculate_damage(&mut *self.rng, &attack);
            if mob.is_controlled() {
                mob.update_movement(dispatcher);
            }
            for line in lines.iter().filter(|line| line.amount > 0) {
                mob.apply_damage(line.amount, attack.to_left, dispatcher);
            }
            result.damage.push(MobDamage { oid, lines });
        }

        debug!(
            skill = attack.skill,
            targets = result.damage.len(),
            "Player attacked"
        );
        self.player.start_attack(&attack);
        self.player.queue(OutboundRecord::Attack { result });
    }

    /// Mobs touching the player hurt it, using positions settled last tick
    fn check_touch_attacks(&mut self) {
        if self.player.is_invincible() || self.player.stats.is_dead() {
            return;
        }

        let body = character_bounds(self.player.position());
        let rng = &mut *self.rng;
        let attack = self
            .mobs
            .values()
            .filter(|mob| mob.is_alive() && mob.bounds().overlaps(&body))
            .find_map(|mob| mob.create_touch_attack(&mut *rng));

        let Some(attack) = attack else {
            return;
        };
        let Some(result) = self.player.damage(&attack, &mut *self.rng) else {
            return;
        };

        self.player.queue(OutboundRecord::TakeDamage {
            from: DamageSource::Touch,
            element: Element::Physical,
            amount: result.damage,
            mob_id: attack.mob_id,
            oid: attack.oid,
            direction: result.direction,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mob::MobData;
    use crate::game::stats::CharStats;
    use crate::net::RecordingDispatcher;
    use crate::terrain::tree::tests::record;
    use crate::util::random::ScriptedRoll;

    fn layout() -> MapLayout {
        MapLayout {
            footholds: vec![record(1, 0, 500, 1000, 500, 0, 0)],
            ladders: vec![Ladder {
                id: 1,
                x: 600,
                y1: 300,
                y2: 500,
                is_ladder: true,
            }],
            portals: vec![Portal {
                x: 900,
                y: 500,
                target_x: 100,
                target_y: 500,
            }],
            recovery_rate: 1.0,
            swim: false,
        }
    }

    fn catalog() -> MobCatalog {
        let mut catalog = MobCatalog::demo();
        catalog.insert(MobData {
            id: 1,
            watk: 100,
            ..Default::default()
        });
        catalog
    }

    fn world_at(x: f64, draws: &[f64]) -> World {
        let rng = ScriptedRoll::new(draws.iter().copied());
        let mut world = World::new(
            &layout(),
            catalog(),
            Player::new(1, CharStats::default()),
            Box::new(rng),
        );
        world.spawn_player(x, 500.0);
        world
    }

    fn spawn_mob(oid: i32, mob_id: i32, x: i16) -> InboundEvent {
        InboundEvent::SpawnMob {
            oid,
            mob_id,
            x,
            y: 500,
            fh: 1,
            stance: 4,
            control: false,
            new_spawn: false,
        }
    }

    #[test]
    fn test_events_apply_at_tick_boundary() {
        let mut world = world_at(100.0, &[0.5]);
        let mut out = RecordingDispatcher::new();
        let ctx = SimContext::default();

        world.push_event(spawn_mob(3, 100100, 700));
        world.push_event(spawn_mob(4, 42, 800));
        assert!(world.mob(3).is_none());

        world.update(&ctx, &mut out);
        assert!(world.mob(3).is_some());
        assert!(world.mob(4).is_none());
        assert_eq!(world.tick(), 1);
    }

    #[test]
    fn test_paused_world_does_not_tick() {
        let mut world = world_at(100.0, &[0.5]);
        let mut out = RecordingDispatcher::new();
        let mut ctx = SimContext::default();
        ctx.set_paused(true);

        world.update(&ctx, &mut out);
        assert_eq!(world.tick(), 0);
        assert_eq!(world.advance(100.0, &ctx, &mut out), 0.0);
    }

    #[test]
    fn test_accumulator_leaves_alpha() {
        let mut world = world_at(100.0, &[0.5]);
        let mut out = RecordingDispatcher::new();
        let ctx = SimContext::default();

        let alpha = world.advance(20.0, &ctx, &mut out);
        assert_eq!(world.tick(), 2);
        assert!((alpha - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_up_grabs_ladder_in_range() {
        let mut world = world_at(600.0, &[0.5]);
        let mut out = RecordingDispatcher::new();

        world.push_key(KeyInput::press(KeyAction::Up));
        world.update(&SimContext::default(), &mut out);

        assert!(world.player().is_climbing());
        assert_eq!(world.player().state(), crate::game::player::CharState::Ladder);
    }

    #[test]
    fn test_up_enters_portal() {
        let mut world = world_at(900.0, &[0.5]);
        let mut out = RecordingDispatcher::new();

        world.push_key(KeyInput::press(KeyAction::Up));
        world.update(&SimContext::default(), &mut out);

        assert_eq!(world.player().position().0, 100);
        assert!(!world.player().can_use_portal());
    }

    #[test]
    fn test_attack_hits_mob_in_reach() {
        let mut world = world_at(300.0, &[0.0]);
        let mut out = RecordingDispatcher::new();
        let ctx = SimContext::default();

        world.push_event(spawn_mob(5, 100100, 370));
        world.update(&ctx, &mut out);
        out.take();

        world.push_key(KeyInput::press(KeyAction::Return));
        world.update(&ctx, &mut out);

        assert!(world.player().is_attacking());
        let result = out
            .records
            .iter()
            .find_map(|r| match r {
                OutboundRecord::Attack { result } => Some(result.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(result.damage.len(), 1);
        assert_eq!(result.damage[0].oid, 5);
        assert!(result.damage[0].lines[0].amount > 0);
        assert!(!out
            .records
            .iter()
            .any(|r| matches!(r, OutboundRecord::TakeDamage { .. })));
    }

    #[test]
    fn test_skill_key_needs_binding() {
        let mut world = world_at(300.0, &[0.0]);
        let mut out = RecordingDispatcher::new();
        let ctx = SimContext::default();

        world.push_key(KeyInput::press(KeyAction::Tab));
        world.update(&ctx, &mut out);
        assert!(!world.player().is_attacking());

        world.player_mut().skill_id = 1001004;
        world.push_key(KeyInput::press(KeyAction::Tab));
        world.update(&ctx, &mut out);
        assert!(out.records.contains(&OutboundRecord::UseSkill {
            skill_id: 1001004
        }));
        assert!(out.records.iter().any(|r| matches!(
            r,
            OutboundRecord::Attack { result } if result.skill == 1001004
        )));
    }

    #[test]
    fn test_touching_mob_hurts_once() {
        let mut world = world_at(300.0, &[0.5]);
        let mut out = RecordingDispatcher::new();
        let ctx = SimContext::default();

        world.push_event(spawn_mob(6, 1, 300));
        for _ in 0..3 {
            world.update(&ctx, &mut out);
        }

        let hits: Vec<_> = out
            .records
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    OutboundRecord::TakeDamage {
                        from: DamageSource::Touch,
                        oid: 6,
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(hits.len(), 1);
        assert!(world.player().is_invincible());
        assert!(world.player().stats.hp < 250);
    }

    #[test]
    fn test_looted_drop_flies_away() {
        let mut world = world_at(300.0, &[0.5]);
        let mut out = RecordingDispatcher::new();
        let ctx = SimContext::default();

        world.push_event(InboundEvent::SpawnDrop {
            oid: 20,
            item_id: 4000000,
            meso: false,
            owner: 1,
            start_x: 350,
            start_y: 500,
            dest_x: 350,
            dest_y: 500,
            mode: 2,
            player_drop: false,
        });
        world.update(&ctx, &mut out);
        assert!(world.drop_item(20).is_some());

        world.push_event(InboundEvent::RemoveDrop {
            oid: 20,
            mode: 2,
            looter: Some(1),
        });
        for _ in 0..60 {
            world.update(&ctx, &mut out);
        }
        assert!(world.drop_item(20).is_none());
    }

    #[test]
    fn test_pet_spawns_next_to_player() {
        let mut world = world_at(300.0, &[0.5]);
        let mut out = RecordingDispatcher::new();
        let ctx = SimContext::default();

        world.push_event(InboundEvent::SpawnPet {
            slot: 1,
            item_id: 5000000,
            name: "Kitty".to_string(),
        });
        world.push_event(InboundEvent::SpawnPet {
            slot: 7,
            item_id: 5000001,
            name: "Ignored".to_string(),
        });
        world.update(&ctx, &mut out);

        let pets: Vec<_> = world.player().pets().collect();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].name, "Kitty");

        let frame = world.snapshot(&SnapshotBuilder::new(1), 1.0);
        assert_eq!(frame.pets.len(), 1);
    }
}
