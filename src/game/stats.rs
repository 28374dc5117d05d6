//! Character statistics and derived movement/combat values

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Weapon families; decides attack style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    #[default]
    None,
    Sword1H,
    Axe1H,
    Mace1H,
    Dagger,
    Wand,
    Staff,
    Sword2H,
    Axe2H,
    Mace2H,
    Spear,
    Polearm,
    Bow,
    Crossbow,
    Claw,
    Knuckle,
    Gun,
    Cash,
}

impl WeaponType {
    /// Decode from the item id prefix (item id / 10000)
    pub fn from_value(value: u16) -> Self {
        match value {
            130 => Self::Sword1H,
            131 => Self::Axe1H,
            132 => Self::Mace1H,
            133 => Self::Dagger,
            137 => Self::Wand,
            138 => Self::Staff,
            140 => Self::Sword2H,
            141 => Self::Axe2H,
            142 => Self::Mace2H,
            143 => Self::Spear,
            144 => Self::Polearm,
            145 => Self::Bow,
            146 => Self::Crossbow,
            147 => Self::Claw,
            148 => Self::Knuckle,
            149 => Self::Gun,
            170 => Self::Cash,
            other => {
                debug!(value = other, "Unknown weapon type");
                Self::None
            }
        }
    }

    pub fn uses_projectiles(self) -> bool {
        matches!(self, Self::Bow | Self::Crossbow | Self::Claw | Self::Gun)
    }

    pub fn is_magic(self) -> bool {
        matches!(self, Self::Wand | Self::Staff)
    }
}

/// Stats an ability point can be spent on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatId {
    Strength,
    Dexterity,
    Intelligence,
    Luck,
    MaxHp,
    MaxMp,
}

impl StatId {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x40 => Some(Self::Strength),
            0x80 => Some(Self::Dexterity),
            0x100 => Some(Self::Intelligence),
            0x200 => Some(Self::Luck),
            0x800 => Some(Self::MaxHp),
            0x2000 => Some(Self::MaxMp),
            other => {
                warn!(code = other, "Unknown stat id");
                None
            }
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Strength => 0x40,
            Self::Dexterity => 0x80,
            Self::Intelligence => 0x100,
            Self::Luck => 0x200,
            Self::MaxHp => 0x800,
            Self::MaxMp => 0x2000,
        }
    }
}

/// Base swing duration at attack speed multiplier 1.0
pub const BASE_ATTACK_MS: f64 = 600.0;

/// Character stats relevant to simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharStats {
    pub level: u16,
    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
    pub ap: u16,

    pub strength: i16,
    pub dexterity: i16,
    pub intelligence: i16,
    pub luck: i16,

    pub weapon_defense: i32,
    pub magic_defense: i32,
    pub accuracy: i16,
    pub avoid: i16,
    /// Movement speed, percent
    pub speed: i16,
    /// Jump height, percent
    pub jump: i16,

    pub min_damage: f64,
    pub max_damage: f64,
    pub critical: f64,
    pub ignore_defense: f64,
    /// Chance to resist knockback
    pub stance: f64,
    /// 0 (fastest) to 9 (slowest)
    pub attack_speed: u8,

    pub weapon: WeaponType,
    pub has_projectiles: bool,
}

impl Default for CharStats {
    fn default() -> Self {
        Self {
            level: 10,
            hp: 250,
            max_hp: 250,
            mp: 100,
            max_mp: 100,
            ap: 0,
            strength: 35,
            dexterity: 20,
            intelligence: 4,
            luck: 4,
            weapon_defense: 20,
            magic_defense: 10,
            accuracy: 30,
            avoid: 10,
            speed: 100,
            jump: 100,
            min_damage: 20.0,
            max_damage: 45.0,
            critical: 0.05,
            ignore_defense: 0.0,
            stance: 0.0,
            attack_speed: 6,
            weapon: WeaponType::Sword1H,
            has_projectiles: false,
        }
    }
}

impl CharStats {
    /// Damage taken from a mob attack of strength `mob_attack`
    pub fn mitigate(&self, mob_attack: i32) -> i32 {
        let wdef = self.weapon_defense;
        if wdef == 0 {
            return mob_attack;
        }
        mob_attack / 2 + mob_attack / wdef - wdef / 2
    }

    pub fn walk_force(&self) -> f64 {
        0.00431 + 0.19653 * self.speed as f64 / 100.0
    }

    pub fn jump_force(&self) -> f64 {
        1.0 + 3.5 * self.jump as f64 / 100.0
    }

    pub fn climb_force(&self) -> f64 {
        0.8 * self.speed as f64 / 100.0
    }

    /// Animation speed multiplier while attacking
    pub fn attack_speed_factor(&self) -> f64 {
        1.7 - self.attack_speed.min(9) as f64 / 10.0
    }

    pub fn attack_duration_ms(&self) -> i64 {
        (BASE_ATTACK_MS / self.attack_speed_factor()) as i64
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.hp = (self.hp - amount.max(0)).max(0);
    }

    pub fn heal(&mut self, hp: i32, mp: i32) {
        self.hp = (self.hp + hp).min(self.max_hp);
        self.mp = (self.mp + mp).min(self.max_mp);
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Spend one ability point; false when none are left
    pub fn spend_ap(&mut self, stat: StatId) -> bool {
        if self.ap == 0 {
            return false;
        }
        self.ap -= 1;
        match stat {
            StatId::Strength => self.strength += 1,
            StatId::Dexterity => self.dexterity += 1,
            StatId::Intelligence => self.intelligence += 1,
            StatId::Luck => self.luck += 1,
            StatId::MaxHp => self.max_hp += 20,
            StatId::MaxMp => self.max_mp += 20,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mitigation() {
        let mut stats = CharStats {
            weapon_defense: 0,
            ..Default::default()
        };
        assert_eq!(stats.mitigate(100), 100);

        stats.weapon_defense = 20;
        assert_eq!(stats.mitigate(100), 50 + 5 - 10);
    }

    #[test]
    fn test_movement_forces() {
        let stats = CharStats::default();
        assert_relative_eq!(stats.walk_force(), 0.20084, epsilon = 1e-9);
        assert_relative_eq!(stats.jump_force(), 4.5, epsilon = 1e-9);
        assert_relative_eq!(stats.climb_force(), 0.8, epsilon = 1e-9);
    }

    #[test]
    fn test_weapon_decode() {
        assert_eq!(WeaponType::from_value(145), WeaponType::Bow);
        assert_eq!(WeaponType::from_value(139), WeaponType::None);
        assert!(WeaponType::Claw.uses_projectiles());
        assert!(WeaponType::Staff.is_magic());
    }

    #[test]
    fn test_spend_ap() {
        let mut stats = CharStats {
            ap: 1,
            ..Default::default()
        };
        assert!(stats.spend_ap(StatId::Luck));
        assert_eq!(stats.luck, 5);
        assert!(!stats.spend_ap(StatId::Luck));

        assert_eq!(StatId::from_code(0x200), Some(StatId::Luck));
        assert_eq!(StatId::from_code(0x1), None);
    }

    #[test]
    fn test_attack_duration_scales() {
        let fast = CharStats {
            attack_speed: 2,
            ..Default::default()
        };
        let slow = CharStats {
            attack_speed: 8,
            ..Default::default()
        };
        assert!(fast.attack_duration_ms() < slow.attack_duration_ms());
    }
}
