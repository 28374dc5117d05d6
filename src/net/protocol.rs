//! Records exchanged with the game server.
//! Encoding to bytes belongs to the transport; these are the typed payloads.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::game::combat::AttackResult;
use crate::game::stats::StatId;

/// Elemental attribute of incoming damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    #[default]
    Physical,
    Ice,
    Fire,
    Lightning,
    Poison,
    Holy,
    Dark,
}

impl Element {
    /// Decode a wire byte; unknown values fall back to physical
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Physical,
            1 => Self::Ice,
            2 => Self::Fire,
            3 => Self::Lightning,
            4 => Self::Poison,
            5 => Self::Holy,
            6 => Self::Dark,
            other => {
                warn!(element = other, "Unknown element, treating as physical");
                Self::Physical
            }
        }
    }
}

/// What caused damage taken by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSource {
    /// Body contact with a mob
    Touch,
    /// A mob's attack or skill, by index
    MobAttack(u8),
    /// Falling and other map hazards
    Environment,
}

impl DamageSource {
    /// Signed code the server expects
    pub fn code(self) -> i8 {
        match self {
            Self::Touch => -1,
            Self::MobAttack(index) => index.min(i8::MAX as u8) as i8,
            Self::Environment => -3,
        }
    }
}

/// One step of movement as reported to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Movement {
    pub command: u8,
    pub x: i32,
    pub y: i32,
    pub last_x: i32,
    pub last_y: i32,
    pub fh: u16,
    /// Stance byte: state value plus one when facing left
    pub stance: u8,
    pub duration_ms: i16,
}

impl Movement {
    pub const ABSOLUTE: u8 = 0;

    /// Whether `newer` differs enough from this one to be worth sending
    pub fn has_moved(&self, newer: &Movement) -> bool {
        self.stance != newer.stance
            || self.x != newer.x
            || self.y != newer.y
            || self.last_x != newer.last_x
            || self.last_y != newer.last_y
    }
}

/// Records pushed to the server as a result of simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundRecord {
    /// The player's position or stance changed this tick
    PlayerMoved { movement: Movement },

    /// A mob this client controls moved
    MobMoved { oid: i32, movement: Movement },

    /// The player took damage
    TakeDamage {
        from: DamageSource,
        element: Element,
        amount: i32,
        mob_id: i32,
        oid: i32,
        /// 0 when hit from the left, 1 from the right
        direction: u8,
    },

    /// The player used a skill
    UseSkill { skill_id: i32 },

    /// The player spent an ability point
    SpendAp { stat: StatId },

    /// The player attacked
    Attack { result: AttackResult },

    /// Passive recovery ticked
    HpMpChange { hp: i32, mp: i32 },
}

impl OutboundRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerMoved { .. } => "player_moved",
            Self::MobMoved { .. } => "mob_moved",
            Self::TakeDamage { .. } => "take_damage",
            Self::UseSkill { .. } => "use_skill",
            Self::SpendAp { .. } => "spend_ap",
            Self::Attack { .. } => "attack",
            Self::HpMpChange { .. } => "hp_mp_change",
        }
    }
}

/// Events received from the server, applied at tick boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    SpawnMob {
        oid: i32,
        mob_id: i32,
        x: i16,
        y: i16,
        fh: u16,
        stance: u8,
        /// Whether this client simulates the mob's AI
        control: bool,
        /// Fade in instead of appearing at full opacity
        new_spawn: bool,
    },

    ControlMob { oid: i32, control: bool },

    /// Authoritative position of a mob controlled elsewhere
    MoveMob { oid: i32, x: i16, y: i16, stance: u8 },

    /// Remove a mob: 0 vanish, 1 die, 2 die and fade
    KillMob { oid: i32, animation: u8 },

    ShowMobHp { oid: i32, percent: i8 },

    SpawnDrop {
        oid: i32,
        item_id: i32,
        meso: bool,
        owner: i32,
        start_x: i16,
        start_y: i16,
        dest_x: i16,
        dest_y: i16,
        /// 0 or 1 dropped, 2 floating in place, 3 already picked up
        mode: u8,
        player_drop: bool,
    },

    /// Remove a drop: 0 fade out, 1 vanish, 2 picked up by `looter`
    RemoveDrop { oid: i32, mode: u8, looter: Option<i32> },

    SpawnPet { slot: u8, item_id: i32, name: String },

    RemovePet { slot: u8 },

    /// Place the player somewhere on the map
    Teleport { x: i16, y: i16 },

    /// Change passive recovery multiplier
    SetRecoveryRate { rate: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_moved_ignores_foothold() {
        let a = Movement {
            x: 10,
            y: 20,
            last_x: 9,
            last_y: 20,
            fh: 3,
            stance: 4,
            ..Default::default()
        };

        let mut b = a;
        b.fh = 7;
        b.duration_ms = 30;
        assert!(!a.has_moved(&b));

        b.stance = 5;
        assert!(a.has_moved(&b));
    }

    #[test]
    fn test_unknown_element_falls_back() {
        assert_eq!(Element::from_byte(2), Element::Fire);
        assert_eq!(Element::from_byte(200), Element::Physical);
    }

    #[test]
    fn test_record_tagging() {
        let record = OutboundRecord::TakeDamage {
            from: DamageSource::Environment,
            element: Element::Physical,
            amount: 10,
            mob_id: 0,
            oid: 0,
            direction: 0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "take_damage");
        assert_eq!(json["amount"], 10);
        assert_eq!(DamageSource::Environment.code(), -3);

        let event: InboundEvent =
            serde_json::from_str(r#"{"type": "teleport", "x": 5, "y": -2}"#).unwrap();
        assert_eq!(event, InboundEvent::Teleport { x: 5, y: -2 });
    }
}
