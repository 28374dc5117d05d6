//! Climbable ladders and ropes

use serde::{Deserialize, Serialize};

/// Which end of a ladder the climber left through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderExit {
    Top,
    Bottom,
}

/// A vertical climbable segment from `y1` (top) to `y2` (bottom)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ladder {
    pub id: u16,
    pub x: i16,
    pub y1: i16,
    pub y2: i16,
    /// Ladders and ropes climb the same; only the pose differs
    #[serde(default = "default_is_ladder")]
    pub is_ladder: bool,
}

fn default_is_ladder() -> bool {
    true
}

impl Ladder {
    /// Whether a climber at (`x`, `y`) moving up or down can grab this ladder
    pub fn in_range(&self, x: i32, y: i32, upwards: bool) -> bool {
        let probe = if upwards { y - 5 } else { y + 5 };
        let x0 = self.x as i32;
        (x0 - 10..=x0 + 10).contains(&x) && (self.y1 as i32..=self.y2 as i32).contains(&probe)
    }

    /// Which end, if any, a climber at `y` has moved past
    pub fn exit(&self, y: f64, downwards: bool) -> Option<LadderExit> {
        let probe = if downwards { y + 5.0 } else { y - 5.0 };
        if probe > self.y2 as f64 {
            Some(LadderExit::Bottom)
        } else if y + 5.0 < self.y1 as f64 {
            Some(LadderExit::Top)
        } else {
            None
        }
    }

    pub fn fell_off(&self, y: f64, downwards: bool) -> bool {
        self.exit(y, downwards).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROPE: Ladder = Ladder {
        id: 1,
        x: 100,
        y1: 200,
        y2: 400,
        is_ladder: false,
    };

    #[test]
    fn test_in_range() {
        assert!(ROPE.in_range(105, 300, true));
        assert!(!ROPE.in_range(120, 300, true));
        // standing at the bottom and pressing up
        assert!(ROPE.in_range(100, 404, true));
        assert!(!ROPE.in_range(100, 404, false));
    }

    #[test]
    fn test_exits() {
        assert_eq!(ROPE.exit(300.0, true), None);
        assert_eq!(ROPE.exit(396.0, true), Some(LadderExit::Bottom));
        assert_eq!(ROPE.exit(194.0, false), Some(LadderExit::Top));
        assert!(!ROPE.fell_off(200.0, false));
    }
}
