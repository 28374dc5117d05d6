//! Foothold segments

use serde::{Deserialize, Serialize};

/// Handle of a foothold inside the terrain graph; 0 means "none"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FootholdId(pub u16);

impl FootholdId {
    pub const NONE: Self = Self(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for FootholdId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed platform or wall segment.
///
/// `x1 == x2` makes the segment a wall. Non-wall footholds provide ground for
/// every x in `l()..=r()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Foothold {
    id: FootholdId,
    layer: u8,
    prev: FootholdId,
    next: FootholdId,
    x1: i16,
    y1: i16,
    x2: i16,
    y2: i16,
}

impl Foothold {
    /// The shared all-zero foothold returned for unknown ids
    pub const NULL: Foothold = Foothold {
        id: FootholdId::NONE,
        layer: 0,
        prev: FootholdId::NONE,
        next: FootholdId::NONE,
        x1: 0,
        y1: 0,
        x2: 0,
        y2: 0,
    };

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: FootholdId,
        layer: u8,
        prev: FootholdId,
        next: FootholdId,
        x1: i16,
        y1: i16,
        x2: i16,
        y2: i16,
    ) -> Self {
        Self {
            id,
            layer,
            prev,
            next,
            x1,
            y1,
            x2,
            y2,
        }
    }

    pub fn id(&self) -> FootholdId {
        self.id
    }

    pub fn layer(&self) -> u8 {
        self.layer
    }

    pub fn prev(&self) -> FootholdId {
        self.prev
    }

    pub fn next(&self) -> FootholdId {
        self.next
    }

    pub(super) fn unlink_prev(&mut self) {
        self.prev = FootholdId::NONE;
    }

    pub(super) fn unlink_next(&mut self) {
        self.next = FootholdId::NONE;
    }

    pub fn x1(&self) -> i16 {
        self.x1
    }

    pub fn y1(&self) -> i16 {
        self.y1
    }

    pub fn x2(&self) -> i16 {
        self.x2
    }

    pub fn y2(&self) -> i16 {
        self.y2
    }

    pub fn l(&self) -> i16 {
        self.x1.min(self.x2)
    }

    pub fn r(&self) -> i16 {
        self.x1.max(self.x2)
    }

    pub fn t(&self) -> i16 {
        self.y1.min(self.y2)
    }

    pub fn b(&self) -> i16 {
        self.y1.max(self.y2)
    }

    pub fn is_null(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_wall(&self) -> bool {
        self.id.is_some() && self.x1 == self.x2
    }

    pub fn is_floor(&self) -> bool {
        self.id.is_some() && self.y1 == self.y2
    }

    pub fn is_left_edge(&self) -> bool {
        self.id.is_some() && self.prev.is_none()
    }

    pub fn is_right_edge(&self) -> bool {
        self.id.is_some() && self.next.is_none()
    }

    /// Rise over run; walls and the null foothold are flat
    pub fn slope(&self) -> f64 {
        if self.x1 == self.x2 {
            return 0.0;
        }
        (self.y2 as f64 - self.y1 as f64) / (self.x2 as f64 - self.x1 as f64)
    }

    /// Height of this foothold's line at `x`
    pub fn ground_below(&self, x: f64) -> f64 {
        if self.is_floor() || self.x1 == self.x2 {
            self.y1 as f64
        } else {
            self.slope() * (x - self.x1 as f64) + self.y1 as f64
        }
    }

    /// Whether this is a wall overlapping the vertical range `top..=bottom`
    pub fn is_blocking(&self, top: i32, bottom: i32) -> bool {
        self.is_wall() && (self.t() as i32) <= bottom && (self.b() as i32) >= top
    }

    pub fn covers_x(&self, x: f64) -> bool {
        x >= self.l() as f64 && x <= self.r() as f64
    }
}
