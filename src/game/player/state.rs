//! Player movement states.
//!
//! Each state is a stateless handler; per-player data lives on [`Player`].
//! The active handler is looked up from the player's [`CharState`] on every
//! call, so a transition takes effect immediately.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::game::input::KeyAction;
use crate::physics::{MovementRegime, Physics, PhysicsFlags};
use crate::terrain::LadderExit;

use super::Player;

/// Fallen height above which landing hurts
pub const FALL_DAMAGE_THRESHOLD: f64 = 600.0;
/// Horizontal push when steering against momentum in the air
const AIR_CONTROL: f64 = 0.025;
/// Force of flying and swimming movement
pub const FLY_FORCE: f64 = 0.25;

/// Character states as numbered on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CharState {
    Walk = 2,
    Stand = 4,
    Fall = 6,
    Alert = 8,
    Prone = 10,
    Swim = 12,
    Ladder = 14,
    Rope = 16,
    Died = 18,
    Sit = 20,
}

impl CharState {
    pub const ALL: [CharState; 10] = [
        CharState::Walk,
        CharState::Stand,
        CharState::Fall,
        CharState::Alert,
        CharState::Prone,
        CharState::Swim,
        CharState::Ladder,
        CharState::Rope,
        CharState::Died,
        CharState::Sit,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Wire byte: odd values face left
    pub fn stance_byte(self, facing_right: bool) -> u8 {
        if facing_right {
            self.value()
        } else {
            self.value() + 1
        }
    }

    /// Decode a stance byte, ignoring the facing bit
    pub fn from_byte(byte: u8) -> Option<Self> {
        let base = byte & !1;
        let state = CharState::ALL.into_iter().find(|s| s.value() == base);
        if state.is_none() {
            warn!(stance = byte, "Unknown character state");
        }
        state
    }

    pub fn is_climbing(self) -> bool {
        matches!(self, CharState::Ladder | CharState::Rope)
    }
}

/// Behaviour of one character state
pub trait PlayerState: Sync {
    /// Runs once when the state is entered
    fn initialize(&self, _player: &mut Player) {}

    /// Reacts to a key press or release
    fn send_action(&self, _player: &mut Player, _action: KeyAction, _pressed: bool) {}

    /// Runs every tick before physics
    fn update(&self, _player: &mut Player) {}

    /// Runs every tick after physics; decides transitions
    fn update_state(&self, _player: &mut Player, _physics: &Physics) {}
}

/// Derives the proper state from the player's situation
pub struct NullState;
pub struct StandState;
pub struct WalkState;
pub struct FallState;
pub struct ProneState;
pub struct SitState;
/// Ladders and ropes
pub struct ClimbState;
/// Swimming, or flying where the map allows it
pub struct FlyState;

static NULL: NullState = NullState;
static STAND: StandState = StandState;
static WALK: WalkState = WalkState;
static FALL: FallState = FallState;
static PRONE: ProneState = ProneState;
static SIT: SitState = SitState;
static CLIMB: ClimbState = ClimbState;
static FLY: FlyState = FlyState;

/// Handler for a character state
pub fn handler(state: CharState) -> &'static dyn PlayerState {
    match state {
        CharState::Stand => &STAND,
        CharState::Walk => &WALK,
        CharState::Fall => &FALL,
        CharState::Prone => &PRONE,
        CharState::Sit => &SIT,
        CharState::Ladder | CharState::Rope => &CLIMB,
        CharState::Swim => &FLY,
        CharState::Alert | CharState::Died => &NULL,
    }
}

/// Handler for a raw stance byte; unknown bytes get the null state
pub fn handler_for_byte(byte: u8) -> &'static dyn PlayerState {
    match CharState::from_byte(byte) {
        Some(state) => handler(state),
        None => &NULL,
    }
}

fn has_walk_input(player: &Player) -> bool {
    player.is_key_down(KeyAction::Left) || player.is_key_down(KeyAction::Right)
}

/// Face and walk according to held keys; false when neither is held
fn walk_from_keys(player: &mut Player) -> bool {
    if player.is_key_down(KeyAction::Left) {
        player.set_direction(false);
        player.set_state(CharState::Walk);
        true
    } else if player.is_key_down(KeyAction::Right) {
        player.set_direction(true);
        player.set_state(CharState::Walk);
        true
    } else {
        false
    }
}

/// Pick the grounded state matching held keys
fn land(player: &mut Player) {
    if walk_from_keys(player) {
        return;
    }
    if player.is_key_down(KeyAction::Down) {
        player.set_state(CharState::Prone);
    } else {
        player.set_state(CharState::Stand);
    }
}

fn request_check_below(player: &mut Player) {
    if !player.phobj.jump_down_enabled {
        player.phobj.flags.insert(PhysicsFlags::CHECK_BELOW);
    }
}

impl PlayerState for NullState {
    fn update_state(&self, player: &mut Player, _physics: &Physics) {
        let state = if player.phobj.on_ground {
            if player.is_key_down(KeyAction::Left) {
                player.set_direction(false);
                CharState::Walk
            } else if player.is_key_down(KeyAction::Right) {
                player.set_direction(true);
                CharState::Walk
            } else if player.is_key_down(KeyAction::Down) {
                CharState::Prone
            } else {
                CharState::Stand
            }
        } else if let Some(ladder) = player.ladder {
            if ladder.is_ladder {
                CharState::Ladder
            } else {
                CharState::Rope
            }
        } else if player.underwater {
            CharState::Swim
        } else {
            CharState::Fall
        };

        player.phobj.regime = MovementRegime::Normal;
        player.set_state(state);
    }
}

impl PlayerState for StandState {
    fn initialize(&self, player: &mut Player) {
        player.phobj.regime = MovementRegime::Normal;
    }

    fn send_action(&self, player: &mut Player, action: KeyAction, pressed: bool) {
        if player.is_attacking() || !pressed {
            return;
        }

        match action {
            KeyAction::Left => {
                player.set_direction(false);
                player.set_state(CharState::Walk);
            }
            KeyAction::Right => {
                player.set_direction(true);
                player.set_state(CharState::Walk);
            }
            KeyAction::Jump => player.jump(),
            KeyAction::Down => player.set_state(CharState::Prone),
            _ => {}
        }
    }

    fn update(&self, player: &mut Player) {
        request_check_below(player);

        if player.is_attacking() {
            return;
        }

        if !walk_from_keys(player) && player.is_key_down(KeyAction::Down) {
            player.set_state(CharState::Prone);
        }
    }

    fn update_state(&self, player: &mut Player, _physics: &Physics) {
        if !player.phobj.on_ground {
            player.set_state(CharState::Fall);
        }
    }
}

impl PlayerState for WalkState {
    fn initialize(&self, player: &mut Player) {
        player.phobj.regime = MovementRegime::Normal;
    }

    fn send_action(&self, player: &mut Player, action: KeyAction, pressed: bool) {
        if player.is_attacking() || !pressed {
            return;
        }

        if action == KeyAction::Jump {
            if player.is_key_down(KeyAction::Down) && player.phobj.jump_down_enabled {
                player.jump_down();
            } else {
                player.jump();
            }
        }
    }

    fn update(&self, player: &mut Player) {
        request_check_below(player);

        if player.is_attacking() {
            return;
        }

        if player.is_key_down(KeyAction::Left) {
            player.set_direction(false);
            player.phobj.h_force -= player.stats.walk_force();
        } else if player.is_key_down(KeyAction::Right) {
            player.set_direction(true);
            player.phobj.h_force += player.stats.walk_force();
        } else if player.is_key_down(KeyAction::Down) {
            player.set_state(CharState::Prone);
        }
    }

    fn update_state(&self, player: &mut Player, _physics: &Physics) {
        if player.phobj.on_ground {
            if !has_walk_input(player) || player.phobj.h_speed == 0.0 {
                player.set_state(CharState::Stand);
            }
        } else {
            player.set_state(CharState::Fall);
        }
    }
}

impl PlayerState for FallState {
    fn initialize(&self, player: &mut Player) {
        player.phobj.regime = MovementRegime::Falling;
        player.fall_apex = player.phobj.current_y();
    }

    fn update(&self, player: &mut Player) {
        player.fall_apex = player.fall_apex.min(player.phobj.current_y());

        if player.is_attacking() {
            return;
        }

        let h_speed = player.phobj.h_speed;
        if player.is_key_down(KeyAction::Left) {
            if h_speed > 0.0 {
                player.phobj.h_force -= AIR_CONTROL;
            }
            player.set_direction(false);
        } else if player.is_key_down(KeyAction::Right) {
            if h_speed < 0.0 {
                player.phobj.h_force += AIR_CONTROL;
            }
            player.set_direction(true);
        }
    }

    fn update_state(&self, player: &mut Player, _physics: &Physics) {
        player.fall_apex = player.fall_apex.min(player.phobj.current_y());

        if player.phobj.on_ground {
            let fallen = player.phobj.current_y() - player.fall_apex;
            if fallen > FALL_DAMAGE_THRESHOLD {
                player.fall_damage(fallen);
            }
            land(player);
        } else if player.underwater {
            player.set_state(CharState::Swim);
        }
    }
}

impl PlayerState for ProneState {
    fn initialize(&self, player: &mut Player) {
        player.phobj.regime = MovementRegime::Normal;
    }

    fn send_action(&self, player: &mut Player, action: KeyAction, pressed: bool) {
        if player.is_attacking() {
            return;
        }

        match (action, pressed) {
            (KeyAction::Jump, true) => {
                if player.phobj.jump_down_enabled && player.is_key_down(KeyAction::Down) {
                    player.jump_down();
                }
            }
            (KeyAction::Down, false) => player.set_state(CharState::Stand),
            _ => {}
        }
    }

    fn update(&self, player: &mut Player) {
        request_check_below(player);

        if !player.is_key_down(KeyAction::Down) {
            player.set_state(CharState::Stand);
        }
    }

    fn update_state(&self, player: &mut Player, _physics: &Physics) {
        if !player.phobj.on_ground {
            player.set_state(CharState::Fall);
        }
    }
}

impl PlayerState for SitState {
    fn initialize(&self, player: &mut Player) {
        player.phobj.regime = MovementRegime::Normal;
    }

    fn send_action(&self, player: &mut Player, action: KeyAction, pressed: bool) {
        if !pressed {
            return;
        }

        match action {
            KeyAction::Left => {
                player.set_direction(false);
                player.set_state(CharState::Walk);
            }
            KeyAction::Right => {
                player.set_direction(true);
                player.set_state(CharState::Walk);
            }
            KeyAction::Jump => {
                player.set_state(CharState::Stand);
                player.jump();
            }
            KeyAction::Up => player.set_state(CharState::Stand),
            _ => {}
        }
    }

    fn update_state(&self, player: &mut Player, _physics: &Physics) {
        if !player.phobj.on_ground {
            player.set_state(CharState::Fall);
        }
    }
}

impl PlayerState for ClimbState {
    fn initialize(&self, player: &mut Player) {
        player.phobj.regime = MovementRegime::Fixed;
    }

    fn send_action(&self, player: &mut Player, action: KeyAction, pressed: bool) {
        if action != KeyAction::Jump || !pressed || !has_walk_input(player) {
            return;
        }

        let right = player.is_key_down(KeyAction::Right);
        let launch = player.stats.walk_force() * 8.0;
        player.set_direction(right);
        player.phobj.h_speed = if right { launch } else { -launch };
        player.phobj.v_speed = -player.stats.jump_force() / 1.5;
        player.push_event(super::PlayerEvent::Jump);
        player.release_ladder();
        player.set_state(CharState::Fall);
    }

    fn update(&self, player: &mut Player) {
        let up = player.is_key_down(KeyAction::Up);
        let down = player.is_key_down(KeyAction::Down);
        let climb = player.stats.climb_force();

        player.phobj.h_speed = 0.0;
        player.phobj.v_speed = match (up, down) {
            (true, false) => -climb,
            (false, true) => climb,
            _ => 0.0,
        };
    }

    fn update_state(&self, player: &mut Player, physics: &Physics) {
        let Some(ladder) = player.ladder else {
            NULL.update_state(player, physics);
            return;
        };

        let downwards = player.is_key_down(KeyAction::Down);
        match ladder.exit(player.phobj.current_y(), downwards) {
            Some(LadderExit::Bottom) => {
                player.release_ladder();
                player.set_state(CharState::Fall);
            }
            Some(LadderExit::Top) => {
                let x = ladder.x as f64;
                let tree = physics.tree();
                let fh_id = tree.foothold_below(x, ladder.y1 as f64 - 5.0);

                player.release_ladder();
                if fh_id.is_none() {
                    player.set_state(CharState::Fall);
                    return;
                }

                let ground = tree.get_foothold(fh_id).ground_below(x);
                player.phobj.reset_movement();
                player.phobj.set_y(ground);
                player.phobj.fh_id = fh_id;
                player.phobj.on_ground = true;
                land(player);
            }
            None => {}
        }
    }
}

impl PlayerState for FlyState {
    fn initialize(&self, player: &mut Player) {
        player.phobj.regime = if player.underwater {
            MovementRegime::Swimming
        } else {
            MovementRegime::Flying
        };
    }

    fn send_action(&self, player: &mut Player, action: KeyAction, pressed: bool) {
        if !pressed {
            return;
        }

        match action {
            KeyAction::Left => player.set_direction(false),
            KeyAction::Right => player.set_direction(true),
            _ => {}
        }
    }

    fn update(&self, player: &mut Player) {
        if player.is_attacking() {
            return;
        }

        if player.is_key_down(KeyAction::Left) {
            player.phobj.h_force = -FLY_FORCE;
        } else if player.is_key_down(KeyAction::Right) {
            player.phobj.h_force = FLY_FORCE;
        }

        if player.is_key_down(KeyAction::Up) {
            player.phobj.v_force = -FLY_FORCE;
        } else if player.is_key_down(KeyAction::Down) {
            player.phobj.v_force = FLY_FORCE;
        }
    }

    fn update_state(&self, player: &mut Player, _physics: &Physics) {
        if player.phobj.on_ground && player.underwater {
            land(player);
        }
    }
}
