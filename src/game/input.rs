//! Key actions delivered by the input source

use serde::{Deserialize, Serialize};

/// Gameplay actions the simulation reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Left,
    Right,
    Up,
    Down,
    Jump,
    /// Attack
    Return,
    /// Used for skills and interaction
    Tab,
}

impl KeyAction {
    pub const ALL: [KeyAction; 7] = [
        KeyAction::Left,
        KeyAction::Right,
        KeyAction::Up,
        KeyAction::Down,
        KeyAction::Jump,
        KeyAction::Return,
        KeyAction::Tab,
    ];

    fn index(self) -> usize {
        match self {
            KeyAction::Left => 0,
            KeyAction::Right => 1,
            KeyAction::Up => 2,
            KeyAction::Down => 3,
            KeyAction::Jump => 4,
            KeyAction::Return => 5,
            KeyAction::Tab => 6,
        }
    }
}

/// A single press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub action: KeyAction,
    pub pressed: bool,
}

impl KeyInput {
    pub fn press(action: KeyAction) -> Self {
        Self {
            action,
            pressed: true,
        }
    }

    pub fn release(action: KeyAction) -> Self {
        Self {
            action,
            pressed: false,
        }
    }
}

/// Which keys are currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    down: [bool; 7],
}

impl KeyState {
    pub fn set(&mut self, action: KeyAction, pressed: bool) {
        self.down[action.index()] = pressed;
    }

    pub fn is_down(&self, action: KeyAction) -> bool {
        self.down[action.index()]
    }

    pub fn clear(&mut self) {
        self.down = [false; 7];
    }

    pub fn any_down(&self) -> bool {
        self.down.iter().any(|d| *d)
    }
}
