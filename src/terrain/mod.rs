//! Map terrain: footholds, ladders and the graph that resolves collisions

pub mod foothold;
pub mod ladder;
pub mod tree;

pub use foothold::{Foothold, FootholdId};
pub use ladder::{Ladder, LadderExit};
pub use tree::{Extent, FootholdTree, SegmentRecord, TerrainError};

use serde::{Deserialize, Serialize};

fn default_recovery_rate() -> f32 {
    1.0
}

/// Static layout of a map as loaded from a terrain source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapLayout {
    pub footholds: Vec<SegmentRecord>,
    #[serde(default)]
    pub ladders: Vec<Ladder>,
    #[serde(default)]
    pub portals: Vec<Portal>,
    /// Multiplier applied to passive HP/MP recovery
    #[serde(default = "default_recovery_rate")]
    pub recovery_rate: f32,
    /// Airborne characters swim instead of falling
    #[serde(default)]
    pub swim: bool,
}

/// A walk-in portal leading to another spot on the same map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portal {
    pub x: i16,
    pub y: i16,
    pub target_x: i16,
    pub target_y: i16,
}

impl Portal {
    /// Whether a character standing at (`x`, `y`) can enter
    pub fn in_range(&self, x: i32, y: i32) -> bool {
        let (px, py) = (self.x as i32, self.y as i32);
        (px - 25..=px + 25).contains(&x) && (py - 50..=py + 10).contains(&y)
    }
}

impl MapLayout {
    pub fn from_json(source: &str) -> Result<Self, TerrainError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Build the terrain graph for this layout
    pub fn build_tree(&self) -> FootholdTree {
        FootholdTree::build(&self.footholds)
    }

    /// A small demo map: a long floor, a raised platform, a rope and a portal
    pub fn demo() -> Self {
        let segment = |id: u16, x1, y1, x2, y2, prev: u16, next: u16| SegmentRecord {
            layer: "0".to_string(),
            id: id.to_string(),
            x1,
            y1,
            x2,
            y2,
            prev,
            next,
        };

        Self {
            footholds: vec![
                segment(1, -1000, 500, 0, 500, 0, 2),
                segment(2, 0, 500, 400, 400, 1, 3),
                segment(3, 400, 400, 1400, 400, 2, 0),
                segment(4, 200, 100, 700, 100, 0, 0),
                segment(5, -1000, 100, -1000, 500, 0, 0),
            ],
            ladders: vec![Ladder {
                id: 1,
                x: 450,
                y1: 90,
                y2: 400,
                is_ladder: false,
            }],
            portals: vec![Portal {
                x: 1300,
                y: 400,
                target_x: -500,
                target_y: 500,
            }],
            recovery_rate: 1.0,
            swim: false,
        }
    }
}
