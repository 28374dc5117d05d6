//! Combat resolution - attack records, hit chance and damage rolls

use serde::{Deserialize, Serialize};

use crate::util::random::Roll;

/// Highest damage a single hit can deal
pub const DAMAGE_CAP: f64 = 999_999.0;

/// Multiplier applied to critical hits
pub const CRITICAL_MULTIPLIER: f64 = 1.5;

/// How attack damage is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Reduced by weapon defense
    #[default]
    Weapon,
    /// Reduced by magic defense
    Magic,
    /// Always the fixed amount, always hits
    Fixed,
}

/// Delivery style of an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    #[default]
    Close,
    Ranged,
    Magic,
}

/// Axis-aligned rectangle in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, right: i32, top: i32, bottom: i32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left <= other.right
            && self.right >= other.left
            && self.top <= other.bottom
            && self.bottom >= other.top
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Attack reach relative to the attacker, given for a left-facing attacker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRange {
    pub left: i16,
    pub right: i16,
    pub top: i16,
    pub bottom: i16,
}

impl Default for AttackRange {
    fn default() -> Self {
        Self {
            left: -80,
            right: -5,
            top: -50,
            bottom: 0,
        }
    }
}

impl AttackRange {
    /// The reach in map coordinates, mirrored when facing right
    pub fn absolute(&self, origin: (i32, i32), to_left: bool) -> Rect {
        let (x, y) = origin;
        let (left, right) = if to_left {
            (self.left as i32, self.right as i32)
        } else {
            (-(self.right as i32), -(self.left as i32))
        };
        Rect::new(x + left, x + right, y + self.top as i32, y + self.bottom as i32)
    }
}

/// An attack as prepared by the attacker; immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub damage_type: DamageType,
    pub attack_type: AttackType,
    pub min_damage: f64,
    pub max_damage: f64,
    pub fixed_damage: i32,
    pub accuracy: i16,
    pub critical: f64,
    pub ignore_defense: f64,
    pub hit_count: u8,
    pub mob_count: u8,
    pub range: AttackRange,
    pub origin: (i32, i32),
    pub to_left: bool,
    pub speed: u8,
    pub player_level: u16,
    pub skill: i32,
    /// Stance byte of the attacker when the attack started
    pub stance: u8,
}

impl Default for Attack {
    fn default() -> Self {
        Self {
            damage_type: DamageType::Weapon,
            attack_type: AttackType::Close,
            min_damage: 1.0,
            max_damage: 1.0,
            fixed_damage: 0,
            accuracy: 0,
            critical: 0.0,
            ignore_defense: 0.0,
            hit_count: 1,
            mob_count: 1,
            range: AttackRange::default(),
            origin: (0, 0),
            to_left: true,
            speed: 6,
            player_level: 1,
            skill: 0,
            stance: 0,
        }
    }
}

impl Attack {
    pub fn reach(&self) -> Rect {
        self.range.absolute(self.origin, self.to_left)
    }
}

/// Defensive stats of the target
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DefenseStats {
    pub level: u16,
    pub weapon_defense: i32,
    pub magic_defense: i32,
    pub avoid: i16,
}

/// Result of one hit; an amount of 0 is a miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageLine {
    pub amount: i32,
    pub critical: bool,
}

impl DamageLine {
    pub const MISS: Self = Self {
        amount: 0,
        critical: false,
    };
}

/// Damage dealt to one mob by an attack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobDamage {
    pub oid: i32,
    pub lines: Vec<DamageLine>,
}

/// Everything the server needs to know about a resolved attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackResult {
    pub attack_type: AttackType,
    pub skill: i32,
    pub hit_count: u8,
    pub mob_count: u8,
    pub speed: u8,
    pub stance: u8,
    pub to_left: bool,
    pub damage: Vec<MobDamage>,
}

impl AttackResult {
    pub fn new(attack: &Attack) -> Self {
        Self {
            attack_type: attack.attack_type,
            skill: attack.skill,
            hit_count: attack.hit_count,
            mob_count: 0,
            speed: attack.speed,
            stance: attack.stance,
            to_left: attack.to_left,
            damage: Vec::new(),
        }
    }
}

/// A mob's attack against the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MobAttack {
    pub watk: i32,
    pub origin: (i32, i32),
    pub mob_id: i32,
    pub oid: i32,
}

/// Outcome of a mob attack after the player's mitigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobAttackResult {
    pub attack: MobAttack,
    pub damage: i32,
    /// 0 when pushed to the left, 1 to the right
    pub direction: u8,
}

/// Levels the target has above the attacker, never negative
pub fn level_delta(target_level: u16, attacker_level: u16) -> f64 {
    target_level.saturating_sub(attacker_level) as f64
}

pub fn min_damage(defense: &DefenseStats, leveldelta: f64, damage: f64, magic: bool) -> f64 {
    let min = if magic {
        damage - (1.0 + 0.01 * leveldelta) * defense.magic_defense as f64 * 0.6
    } else {
        damage * (1.0 - 0.01 * leveldelta) - defense.weapon_defense as f64 * 0.6
    };
    min.max(1.0)
}

pub fn max_damage(defense: &DefenseStats, leveldelta: f64, damage: f64, magic: bool) -> f64 {
    let max = if magic {
        damage - (1.0 + 0.01 * leveldelta) * defense.magic_defense as f64 * 0.5
    } else {
        damage * (1.0 - 0.01 * leveldelta) - defense.weapon_defense as f64 * 0.5
    };
    max.max(1.0)
}

pub fn hitchance(defense: &DefenseStats, leveldelta: f64, accuracy: i16) -> f64 {
    let chance = accuracy as f64 / ((1.84 + 0.07 * leveldelta) * defense.avoid as f64 + 1.0);
    chance.max(0.01)
}

/// Roll a single hit: hit draw, then damage draw, then critical draw
pub fn next_damage(
    rng: &mut dyn Roll,
    min: f64,
    max: f64,
    hitchance: f64,
    critical: f64,
) -> DamageLine {
    if !rng.below(hitchance) {
        return DamageLine::MISS;
    }

    let mut damage = rng.next_real(min, max);
    let critical = rng.below(critical);
    if critical {
        damage *= CRITICAL_MULTIPLIER;
    }

    DamageLine {
        amount: damage.clamp(1.0, DAMAGE_CAP) as i32,
        critical,
    }
}

/// Resolve every hit of `attack` against a target with `defense`
pub fn calculate_damage(rng: &mut dyn Roll, defense: &DefenseStats, attack: &Attack) -> Vec<DamageLine> {
    let leveldelta = level_delta(defense.level, attack.player_level);

    let (min, max, chance, critical) = match attack.damage_type {
        DamageType::Weapon | DamageType::Magic => {
            let magic = attack.damage_type == DamageType::Magic;
            (
                min_damage(defense, leveldelta, attack.min_damage, magic),
                max_damage(defense, leveldelta, attack.max_damage, magic),
                hitchance(defense, leveldelta, attack.accuracy),
                attack.critical,
            )
        }
        DamageType::Fixed => {
            let fixed = attack.fixed_damage as f64;
            (fixed, fixed, 1.0, 0.0)
        }
    };

    (0..attack.hit_count)
        .map(|_| next_damage(rng, min, max, chance, critical))
        .collect()
}
