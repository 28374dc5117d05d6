//! Terrain graph: foothold storage, spatial lookup and collision resolution

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::foothold::{Foothold, FootholdId};
use crate::physics::{MovementRegime, PhysicsFlags, PhysicsObject};

/// Max drop height for which jumping down is allowed
pub const JUMP_DOWN_MAX_DROP: f64 = 600.0;

/// Adjacency links followed in one tick before falling back to a column search
const MAX_LINK_HOPS: usize = 8;

/// Inset of the horizontal walls from the outermost foothold ends
const WALL_INSET: i32 = 25;
/// Headroom above the highest foothold
const BORDER_TOP_MARGIN: i32 = 300;
/// Slack below the lowest foothold
const BORDER_BOTTOM_MARGIN: i32 = 100;
/// Bounds used when a map has no footholds at all
const EMPTY_TERRAIN_BOUND: i32 = 30000;

/// Errors found while reading terrain data.
///
/// Per-record problems are logged and the record is skipped; only a source
/// that cannot be read at all reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    #[error("Invalid foothold id: {0:?}")]
    InvalidId(String),

    #[error("Invalid foothold layer: {0:?}")]
    InvalidLayer(String),

    #[error("Duplicate foothold id: {0}")]
    DuplicateId(u16),

    #[error("Malformed terrain source: {0}")]
    Json(#[from] serde_json::Error),
}

/// One foothold as it appears in map data.
///
/// Layer and id are textual node names in the source format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub layer: String,
    pub id: String,
    pub x1: i16,
    pub y1: i16,
    pub x2: i16,
    pub y2: i16,
    #[serde(default)]
    pub prev: u16,
    #[serde(default)]
    pub next: u16,
}

impl SegmentRecord {
    fn parse(&self) -> Result<Foothold, TerrainError> {
        let id: u16 = self
            .id
            .trim()
            .parse()
            .map_err(|_| TerrainError::InvalidId(self.id.clone()))?;
        if id == 0 {
            return Err(TerrainError::InvalidId(self.id.clone()));
        }

        let layer: u8 = self
            .layer
            .trim()
            .parse()
            .map_err(|_| TerrainError::InvalidLayer(self.layer.clone()))?;

        Ok(Foothold::new(
            FootholdId(id),
            layer,
            FootholdId(self.prev),
            FootholdId(self.next),
            self.x1,
            self.y1,
            self.x2,
            self.y2,
        ))
    }
}

/// Closed interval `low..=high`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub low: i32,
    pub high: i32,
}

impl Extent {
    pub fn new(low: i32, high: i32) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.low && value <= self.high
    }
}

/// All footholds of a map plus the derived wall and border bounds
#[derive(Debug, Clone)]
pub struct FootholdTree {
    footholds: HashMap<FootholdId, Foothold>,
    /// Build order, for deterministic iteration
    order: Vec<FootholdId>,
    /// Non-wall footholds covering each integer x
    columns: HashMap<i32, Vec<FootholdId>>,
    walls: Extent,
    borders: Extent,
}

impl Default for FootholdTree {
    fn default() -> Self {
        Self::build(&[])
    }
}

impl FootholdTree {
    /// Build the graph from segment records.
    ///
    /// Never fails: bad records are skipped and dangling links are cleared.
    pub fn build(records: &[SegmentRecord]) -> Self {
        let mut footholds = HashMap::with_capacity(records.len());
        let mut order = Vec::with_capacity(records.len());

        for record in records {
            let foothold = match record.parse() {
                Ok(fh) => fh,
                Err(e) => {
                    warn!(id = %record.id, layer = %record.layer, error = %e, "Skipping foothold");
                    continue;
                }
            };

            if footholds.contains_key(&foothold.id()) {
                let e = TerrainError::DuplicateId(foothold.id().0);
                warn!(error = %e, "Skipping foothold");
                continue;
            }

            order.push(foothold.id());
            footholds.insert(foothold.id(), foothold);
        }

        // Close adjacency: every remaining link must resolve
        for id in &order {
            let (prev, next) = match footholds.get(id) {
                Some(fh) => (fh.prev(), fh.next()),
                None => continue,
            };
            let prev_dangling = prev.is_some() && !footholds.contains_key(&prev);
            let next_dangling = next.is_some() && !footholds.contains_key(&next);

            if let Some(fh) = footholds.get_mut(id) {
                if prev_dangling {
                    warn!(fh_id = %id, prev = %prev, "Clearing dangling prev link");
                    fh.unlink_prev();
                }
                if next_dangling {
                    warn!(fh_id = %id, next = %next, "Clearing dangling next link");
                    fh.unlink_next();
                }
            }
        }

        let mut columns: HashMap<i32, Vec<FootholdId>> = HashMap::new();
        let mut left = i32::MAX;
        let mut right = i32::MIN;
        let mut top = i32::MAX;
        let mut bottom = i32::MIN;

        for id in &order {
            let Some(fh) = footholds.get(id) else {
                continue;
            };

            left = left.min(fh.l() as i32);
            right = right.max(fh.r() as i32);
            top = top.min(fh.t() as i32);
            bottom = bottom.max(fh.b() as i32);

            if fh.is_wall() {
                continue;
            }

            for x in fh.l() as i32..=fh.r() as i32 {
                columns.entry(x).or_default().push(*id);
            }
        }

        let (walls, borders) = if order.is_empty() {
            (
                Extent::new(-EMPTY_TERRAIN_BOUND, EMPTY_TERRAIN_BOUND),
                Extent::new(-EMPTY_TERRAIN_BOUND, EMPTY_TERRAIN_BOUND),
            )
        } else {
            (
                Extent::new(left + WALL_INSET, right - WALL_INSET),
                Extent::new(top - BORDER_TOP_MARGIN, bottom + BORDER_BOTTOM_MARGIN),
            )
        };

        debug!(
            footholds = order.len(),
            skipped = records.len() - order.len(),
            "Terrain built"
        );

        Self {
            footholds,
            order,
            columns,
            walls,
            borders,
        }
    }

    /// Parse a JSON array of segment records and build from it
    pub fn from_json(source: &str) -> Result<Self, TerrainError> {
        let records: Vec<SegmentRecord> = serde_json::from_str(source)?;
        Ok(Self::build(&records))
    }

    pub fn get_foothold(&self, id: FootholdId) -> &Foothold {
        self.footholds.get(&id).unwrap_or(&Foothold::NULL)
    }

    /// Footholds in build order
    pub fn footholds(&self) -> impl Iterator<Item = &Foothold> {
        self.order.iter().filter_map(|id| self.footholds.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn walls(&self) -> Extent {
        self.walls
    }

    pub fn borders(&self) -> Extent {
        self.borders
    }

    /// The highest foothold at `x` whose ground is at or below `y`
    pub fn foothold_below(&self, x: f64, y: f64) -> FootholdId {
        let Some(column) = self.columns.get(&(x.floor() as i32)) else {
            return FootholdId::NONE;
        };

        let mut best = FootholdId::NONE;
        let mut best_y = self.borders.high as f64;

        for id in column {
            let ground = self.get_foothold(*id).ground_below(x);
            if ground < y || ground > best_y {
                continue;
            }
            if best.is_none() || ground < best_y {
                best = *id;
                best_y = ground;
            }
        }

        best
    }

    /// Y of the ground under a point, or the bottom border if there is none
    pub fn ground_below(&self, x: f64, y: f64) -> f64 {
        let id = self.foothold_below(x, y);
        if id.is_none() {
            return self.borders.high as f64;
        }
        self.get_foothold(id).ground_below(x)
    }

    /// X at which horizontal movement from `current` is stopped by a wall
    pub fn get_wall(&self, current: FootholdId, left: bool, fy: f64) -> f64 {
        let y = fy as i32;
        let (top, bottom) = (y - 50, y - 1);
        let cur = self.get_foothold(current);

        if left {
            let prev = self.get_foothold(cur.prev());
            if prev.is_blocking(top, bottom) {
                return cur.l() as f64;
            }
            let prev_prev = self.get_foothold(prev.prev());
            if prev_prev.is_blocking(top, bottom) {
                return prev.l() as f64;
            }
            self.walls.low as f64
        } else {
            let next = self.get_foothold(cur.next());
            if next.is_blocking(top, bottom) {
                return cur.r() as f64;
            }
            let next_next = self.get_foothold(next.next());
            if next_next.is_blocking(top, bottom) {
                return next.r() as f64;
            }
            self.walls.high as f64
        }
    }

    /// X of the end of the foothold chain in the given direction
    pub fn get_edge(&self, current: FootholdId, left: bool) -> f64 {
        let cur = self.get_foothold(current);

        if left {
            if cur.prev().is_none() {
                return cur.l() as f64;
            }
            let prev = self.get_foothold(cur.prev());
            if prev.prev().is_none() {
                return prev.l() as f64;
            }
            self.walls.low as f64
        } else {
            if cur.next().is_none() {
                return cur.r() as f64;
            }
            let next = self.get_foothold(cur.next());
            if next.next().is_none() {
                return next.r() as f64;
            }
            self.walls.high as f64
        }
    }

    /// Re-resolve which foothold supports `obj` and whether it stands on it
    pub fn update_current_foothold(&self, obj: &mut PhysicsObject) {
        if obj.regime == MovementRegime::Fixed && obj.fh_id.is_some() {
            return;
        }

        let current = *self.get_foothold(obj.fh_id);
        let x = obj.current_x();
        let y = obj.current_y();
        let mut check_slope = false;

        if obj.on_ground {
            // Follow the chain while x lies past the linked foothold
            let mut linked = current;
            for _ in 0..MAX_LINK_HOPS {
                let link = if x.floor() > linked.r() as f64 {
                    linked.next()
                } else if x.ceil() < linked.l() as f64 {
                    linked.prev()
                } else {
                    break;
                };
                obj.fh_id = link;
                if link.is_none() {
                    break;
                }
                linked = *self.get_foothold(link);
                if linked.is_wall() {
                    break;
                }
            }

            let overshot = x.floor() > linked.r() as f64 || x.ceil() < linked.l() as f64;
            if obj.fh_id.is_some() && !linked.is_wall() && overshot {
                obj.fh_id = FootholdId::NONE;
            }

            if obj.fh_id.is_none() {
                obj.fh_id = self.foothold_below(x, y);
            } else {
                check_slope = true;
            }

            if obj.fh_id.is_none() {
                if current.is_null() {
                    obj.on_ground = false;
                    return;
                }
                // Nothing beneath the edge: stay on it
                obj.fh_id = current.id();
                let edge = if x > current.r() as f64 {
                    current.r()
                } else {
                    current.l()
                };
                obj.limit_x(edge as f64);
                return;
            }
        } else {
            obj.fh_id = self.foothold_below(x, y);
            if obj.fh_id.is_none() {
                return;
            }
        }

        if obj.regime == MovementRegime::Falling
            && obj.jumping_down_from.is_some()
            && obj.fh_id == obj.jumping_down_from
        {
            let leaving = self.get_foothold(obj.fh_id);
            obj.fh_id = self.foothold_below(x, leaving.ground_below(x) + 1.0);
            if obj.fh_id.is_none() {
                obj.on_ground = false;
                return;
            }
        }

        let next = *self.get_foothold(obj.fh_id);
        obj.fh_slope = next.slope();

        let ground = next.ground_below(x);
        if obj.v_speed == 0.0 && check_slope {
            let mut vdelta = obj.fh_slope.abs();
            if obj.fh_slope < 0.0 {
                vdelta *= ground - y;
            } else if obj.fh_slope > 0.0 {
                vdelta *= y - ground;
            }

            if (current.slope() != 0.0 || next.slope() != 0.0)
                && ((obj.h_speed > 0.0 && vdelta <= obj.h_speed)
                    || (obj.h_speed < 0.0 && vdelta >= obj.h_speed))
            {
                obj.y.assign(ground);
            }
        }

        obj.on_ground = obj.current_y().round() == ground.round();

        if obj.regime == MovementRegime::Falling
            && obj.on_ground
            && obj.jumping_down_from.is_some()
        {
            obj.jumping_down_from = FootholdId::NONE;
        }

        if obj.jump_down_enabled || obj.flags.contains(PhysicsFlags::CHECK_BELOW) {
            let below = self.foothold_below(x, ground + 1.0);
            if below.is_some() {
                let next_ground = self.get_foothold(below).ground_below(x);
                obj.jump_down_enabled = next_ground - ground < JUMP_DOWN_MAX_DROP;
                obj.ground_below_y = ground + 1.0;
            } else {
                obj.jump_down_enabled = false;
            }
            obj.flags.remove(PhysicsFlags::CHECK_BELOW);
        }

        if obj.fh_layer == 0 || obj.on_ground {
            obj.fh_layer = next.layer();
        }
    }

    /// Clamp the velocity of `obj` so its next position respects terrain
    pub fn limit_movement(&self, obj: &mut PhysicsObject) {
        if obj.is_moving_horizontally() {
            let crnt_x = obj.current_x();
            let next_x = obj.next_x();
            let left = obj.h_speed < 0.0;

            let crosses = |wall: f64| {
                if left {
                    crnt_x >= wall && next_x <= wall
                } else {
                    crnt_x <= wall && next_x >= wall
                }
            };

            let mut wall = self.get_wall(obj.fh_id, left, obj.next_y());
            let mut collision = crosses(wall);

            if !collision && obj.flags.contains(PhysicsFlags::TURN_AT_EDGES) && obj.fh_id.is_some()
            {
                wall = self.get_edge(obj.fh_id, left);
                collision = crosses(wall);
            }

            if collision {
                obj.limit_x(wall);
                obj.flags.remove(PhysicsFlags::TURN_AT_EDGES);
            }
        }

        if obj.is_moving_vertically() {
            let crnt_x = obj.current_x();
            let next_x = obj.next_x();
            let crnt_y = obj.current_y();
            let next_y = obj.next_y();

            let fh = self.get_foothold(obj.fh_id);
            if !fh.is_null() {
                let ground_now = fh.ground_below(crnt_x);
                let ground_next = fh.ground_below(next_x);

                if crnt_y <= ground_now && next_y >= ground_next {
                    if obj.v_speed > 0.0 {
                        obj.landing_impact = Some((obj.h_speed, obj.v_speed));
                    }
                    obj.limit_y(ground_next);
                    self.limit_movement(obj);
                    return;
                }
            }

            if next_y < self.borders.low as f64 {
                obj.limit_y(self.borders.low as f64);
            } else if next_y > self.borders.high as f64 {
                obj.limit_y(self.borders.high as f64);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(id: u16, x1: i16, y1: i16, x2: i16, y2: i16, prev: u16, next: u16) -> SegmentRecord {
        SegmentRecord {
            layer: "0".to_string(),
            id: id.to_string(),
            x1,
            y1,
            x2,
            y2,
            prev,
            next,
        }
    }

    /// A flat floor at y=500 from x=0 to x=1000
    pub(crate) fn flat_floor() -> FootholdTree {
        FootholdTree::build(&[record(1, 0, 500, 1000, 500, 0, 0)])
    }

    #[test]
    fn test_bounds() {
        let tree = flat_floor();
        assert_eq!(tree.walls(), Extent::new(25, 975));
        assert_eq!(tree.borders(), Extent::new(200, 600));

        let empty = FootholdTree::default();
        assert!(empty.is_empty());
        assert!(empty.walls().contains(0));
        assert!(empty.borders().contains(0));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let mut bad_id = record(2, 0, 0, 10, 0, 0, 0);
        bad_id.id = "two".to_string();
        let mut bad_layer = record(3, 0, 0, 10, 0, 0, 0);
        bad_layer.layer = "-1".to_string();
        let zero = record(0, 0, 0, 10, 0, 0, 0);

        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 0, 0),
            bad_id,
            bad_layer,
            zero,
            record(1, 0, 900, 100, 900, 0, 0),
        ]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get_foothold(FootholdId(1)).y1(), 500);
        assert!(tree.get_foothold(FootholdId(3)).is_null());
    }

    #[test]
    fn test_adjacency_is_closed() {
        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 9, 2),
            record(2, 100, 500, 200, 450, 1, 7),
            record(3, 300, 300, 400, 300, 0, 0),
        ]);

        for fh in tree.footholds() {
            for link in [fh.prev(), fh.next()] {
                if link.is_some() {
                    assert!(!tree.get_foothold(link).is_null(), "{} links to {}", fh.id(), link);
                }
            }
        }
        assert!(tree.get_foothold(FootholdId(1)).prev().is_none());
        assert_eq!(tree.get_foothold(FootholdId(1)).next(), FootholdId(2));
        assert!(tree.get_foothold(FootholdId(2)).next().is_none());
    }

    #[test]
    fn test_foothold_below_picks_nearest() {
        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 0, 0),
            record(2, 0, 300, 100, 300, 0, 0),
            record(3, 0, 100, 100, 100, 0, 0),
        ]);

        assert_eq!(tree.foothold_below(50.0, 200.0), FootholdId(2));
        assert_eq!(tree.foothold_below(50.0, 300.0), FootholdId(2));
        assert_eq!(tree.foothold_below(50.0, 301.0), FootholdId(1));
        assert_eq!(tree.foothold_below(50.0, 501.0), FootholdId::NONE);
        assert_eq!(tree.foothold_below(150.0, 0.0), FootholdId::NONE);
        assert_eq!(tree.ground_below(150.0, 0.0), tree.borders().high as f64);
    }

    #[test]
    fn test_equal_heights_first_built_wins() {
        let tree = FootholdTree::build(&[
            record(5, 0, 400, 100, 400, 0, 0),
            record(4, 50, 400, 150, 400, 0, 0),
        ]);
        assert_eq!(tree.foothold_below(75.0, 0.0), FootholdId(5));
    }

    #[test]
    fn test_ground_snap_is_idempotent() {
        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 0, 2),
            record(2, 100, 500, 200, 400, 1, 0),
        ]);

        let mut obj = PhysicsObject::at(150.0, 450.0);
        obj.fh_id = FootholdId(2);
        obj.h_speed = 1.0;

        tree.update_current_foothold(&mut obj);
        let first = (obj.fh_id, obj.current_y(), obj.on_ground);
        tree.update_current_foothold(&mut obj);
        let second = (obj.fh_id, obj.current_y(), obj.on_ground);

        assert_eq!(first, second);
        assert!(obj.on_ground);
    }

    #[test]
    fn test_walking_onto_next_foothold() {
        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 0, 2),
            record(2, 100, 500, 200, 500, 1, 0),
        ]);

        let mut obj = PhysicsObject::at(101.5, 500.0);
        obj.fh_id = FootholdId(1);
        tree.update_current_foothold(&mut obj);

        assert_eq!(obj.fh_id, FootholdId(2));
        assert!(obj.on_ground);
    }

    #[test]
    fn test_overshooting_short_foothold_follows_chain() {
        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 0, 2),
            record(2, 100, 500, 102, 490, 1, 3),
            record(3, 102, 490, 300, 490, 2, 0),
        ]);

        let mut obj = PhysicsObject::at(104.0, 500.0);
        obj.fh_id = FootholdId(1);
        obj.on_ground = true;
        tree.update_current_foothold(&mut obj);

        assert_eq!(obj.fh_id, FootholdId(3));
        assert_eq!(obj.fh_slope, 0.0);
        assert_eq!(tree.get_foothold(obj.fh_id).ground_below(104.0), 490.0);
    }

    #[test]
    fn test_jump_down_bookkeeping_clears_only_when_falling() {
        let tree = flat_floor();

        let mut obj = PhysicsObject::at(500.0, 500.0);
        obj.fh_id = FootholdId(1);
        obj.jumping_down_from = FootholdId(7);
        tree.update_current_foothold(&mut obj);
        assert!(obj.on_ground);
        assert_eq!(obj.jumping_down_from, FootholdId(7));

        obj.regime = MovementRegime::Falling;
        tree.update_current_foothold(&mut obj);
        assert!(obj.jumping_down_from.is_none());
    }

    #[test]
    fn test_edge_with_nothing_below_pins() {
        let tree = flat_floor();

        let mut obj = PhysicsObject::at(1001.5, 500.0);
        obj.fh_id = FootholdId(1);
        obj.h_speed = 2.0;
        tree.update_current_foothold(&mut obj);

        assert_eq!(obj.fh_id, FootholdId(1));
        assert_eq!(obj.current_x(), 1000.0);
        assert_eq!(obj.h_speed, 0.0);
    }

    #[test]
    fn test_wall_blocks_horizontal_motion() {
        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 0, 2),
            record(2, 100, 500, 100, 400, 1, 0),
        ]);

        let mut obj = PhysicsObject::at(99.0, 500.0);
        obj.fh_id = FootholdId(1);
        obj.h_speed = 3.0;
        tree.limit_movement(&mut obj);

        assert_eq!(obj.current_x(), 100.0);
        assert_eq!(obj.h_speed, 0.0);
    }

    #[test]
    fn test_turn_at_edges_clears_flag() {
        let tree = FootholdTree::build(&[
            record(1, 0, 500, 100, 500, 0, 0),
            record(2, -500, 800, 500, 800, 0, 0),
        ]);

        let mut obj = PhysicsObject::at(2.0, 500.0);
        obj.fh_id = FootholdId(1);
        obj.h_speed = -3.0;
        obj.flags.insert(PhysicsFlags::TURN_AT_EDGES);
        tree.limit_movement(&mut obj);

        assert_eq!(obj.current_x(), 0.0);
        assert!(!obj.flags.contains(PhysicsFlags::TURN_AT_EDGES));
    }

    #[test]
    fn test_landing_clamps_to_ground() {
        let tree = flat_floor();

        let mut obj = PhysicsObject::at(500.0, 498.0);
        obj.on_ground = false;
        obj.fh_id = FootholdId(1);
        obj.v_speed = 4.0;
        tree.limit_movement(&mut obj);

        assert_eq!(obj.current_y(), 500.0);
        assert_eq!(obj.v_speed, 0.0);
        assert_eq!(obj.landing_impact, Some((0.0, 4.0)));
    }

    #[test]
    fn test_check_below_enables_jump_down() {
        let tree = FootholdTree::build(&[
            record(1, 0, 300, 200, 300, 0, 0),
            record(2, 0, 500, 200, 500, 0, 0),
        ]);

        let mut obj = PhysicsObject::at(100.0, 300.0);
        obj.fh_id = FootholdId(1);
        obj.flags.insert(PhysicsFlags::CHECK_BELOW);
        tree.update_current_foothold(&mut obj);

        assert!(obj.jump_down_enabled);
        assert_eq!(obj.ground_below_y, 301.0);
        assert!(!obj.flags.contains(PhysicsFlags::CHECK_BELOW));
    }

    #[test]
    fn test_from_json() {
        let source = r#"[
            {"layer": "1", "id": "10", "x1": 0, "y1": 100, "x2": 50, "y2": 100, "next": 11},
            {"layer": "1", "id": "11", "x1": 50, "y1": 100, "x2": 90, "y2": 120, "prev": 10}
        ]"#;
        let tree = FootholdTree::from_json(source).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get_foothold(FootholdId(11)).layer(), 1);

        assert!(FootholdTree::from_json("{").is_err());
    }
}
