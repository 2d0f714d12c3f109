use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Pitch coordinate in metres, origin at the centre spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    fn rotated(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Attacking,
    Defensive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRect {
    pub id: String,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ZoneRect {
    fn new(id: &str, x: (f64, f64), y: (f64, f64)) -> Self {
        Self {
            id: id.to_string(),
            x_min: x.0,
            x_max: x.1,
            y_min: y.0,
            y_max: y.1,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    fn mirrored(&self) -> Self {
        Self {
            id: self.id.clone(),
            x_min: self.x_min,
            x_max: self.x_max,
            y_min: -self.y_max,
            y_max: -self.y_min,
        }
    }
}

/// Ordered zones; the first containing rectangle wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneLayout {
    pub zones: Vec<ZoneRect>,
}

impl ZoneLayout {
    pub fn assign(&self, p: Point) -> Option<&str> {
        self.zones
            .iter()
            .find(|z| z.contains(p))
            .map(|z| z.id.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.zones.iter().map(|z| z.id.as_str())
    }

    pub fn mirrored(&self) -> Self {
        Self {
            zones: self.zones.iter().map(ZoneRect::mirrored).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

const BOX_EDGE_X: f64 = 36.0;
const PENALTY_SPOT_BAND_X: f64 = 41.5;
const SIX_YARD_X: f64 = 47.0;
const GOAL_LINE_X: f64 = 52.5;
const BOX_HALF_WIDTH: f64 = 20.16;
const SIX_YARD_HALF_WIDTH: f64 = 9.16;

fn default_left_layout() -> ZoneLayout {
    let goal = (SIX_YARD_X, GOAL_LINE_X);
    let band = (PENALTY_SPOT_BAND_X, SIX_YARD_X);
    ZoneLayout {
        zones: vec![
            ZoneRect::new("six_near", goal, (0.0, SIX_YARD_HALF_WIDTH)),
            ZoneRect::new("six_far", goal, (-SIX_YARD_HALF_WIDTH, 0.0)),
            ZoneRect::new("near_post_wide", goal, (SIX_YARD_HALF_WIDTH, BOX_HALF_WIDTH)),
            ZoneRect::new("far_post_wide", goal, (-BOX_HALF_WIDTH, -SIX_YARD_HALF_WIDTH)),
            ZoneRect::new("penalty_near", band, (0.0, BOX_HALF_WIDTH)),
            ZoneRect::new("penalty_far", band, (-BOX_HALF_WIDTH, 0.0)),
            ZoneRect::new(
                "box_edge",
                (BOX_EDGE_X, PENALTY_SPOT_BAND_X),
                (-BOX_HALF_WIDTH, BOX_HALF_WIDTH),
            ),
            ZoneRect::new("outside_box", (0.0, GOAL_LINE_X + 5.0), (-40.0, 40.0)),
        ],
    }
}

/// Zone layouts for both roles and sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub attacking_left: ZoneLayout,
    pub attacking_right: ZoneLayout,
    pub defensive_left: ZoneLayout,
    pub defensive_right: ZoneLayout,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        let left = default_left_layout();
        let right = left.mirrored();
        Self {
            attacking_left: left.clone(),
            attacking_right: right.clone(),
            defensive_left: left,
            defensive_right: right,
        }
    }
}

impl ZoneConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read zone config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse zone config {}", path.display()))
    }

    pub fn layout(&self, role: Role, side: Side) -> &ZoneLayout {
        match (role, side) {
            (Role::Attacking, Side::Left) => &self.attacking_left,
            (Role::Attacking, Side::Right) => &self.attacking_right,
            (Role::Defensive, Side::Left) => &self.defensive_left,
            (Role::Defensive, Side::Right) => &self.defensive_right,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SideMap<T> {
    pub left: T,
    pub right: T,
}

impl<T> SideMap<T> {
    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// A corner expressed in the attacking frame: taken toward +x.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedCorner {
    pub side: Side,
    pub start: Point,
    pub end: Option<Point>,
}

/// Rotates corners taken toward -x by 180 degrees. Corners on the centre
/// line (y == 0) have no side and are dropped.
pub fn normalize_corner(start: Point, end: Option<Point>) -> Option<NormalizedCorner> {
    let (start, end) = if start.x < 0.0 {
        (start.rotated(), end.map(Point::rotated))
    } else {
        (start, end)
    };
    let side = if start.y > 0.0 {
        Side::Left
    } else if start.y < 0.0 {
        Side::Right
    } else {
        return None;
    };
    Some(NormalizedCorner { side, start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_puts_corner_in_attacking_half() {
        let c = normalize_corner(Point { x: -52.5, y: -34.0 }, Some(Point { x: -49.0, y: -3.0 }))
            .unwrap();
        assert_eq!(c.side, Side::Left);
        assert_eq!(c.end, Some(Point { x: 49.0, y: 3.0 }));
    }

    #[test]
    fn centre_line_start_has_no_side() {
        assert!(normalize_corner(Point { x: 52.5, y: 0.0 }, None).is_none());
    }

    #[test]
    fn first_matching_zone_wins() {
        let layout = default_left_layout();
        assert_eq!(layout.assign(Point { x: 50.0, y: 0.0 }), Some("six_near"));
        assert_eq!(layout.assign(Point { x: 44.0, y: -5.0 }), Some("penalty_far"));
        assert_eq!(layout.assign(Point { x: 20.0, y: 0.0 }), Some("outside_box"));
        assert_eq!(layout.assign(Point { x: -20.0, y: 0.0 }), None);
    }

    #[test]
    fn mirrored_layout_swaps_near_and_far() {
        let right = default_left_layout().mirrored();
        assert_eq!(right.assign(Point { x: 50.0, y: -4.0 }), Some("six_near"));
        assert_eq!(right.assign(Point { x: 50.0, y: 4.0 }), Some("six_far"));
    }
}
