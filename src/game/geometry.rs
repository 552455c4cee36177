//! Static wall geometry and the maze builder

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ws::protocol::MobType;

/// Normals shorter than this are treated as degenerate
const MIN_NORMAL_LENGTH: f32 = 1e-4;

/// A 2D point on the map plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle, `x`/`y` is the minimum corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.w
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.h
    }
}

/// Bounding box used by the broad phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

/// Immutable static obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Wall {
    Rect(Rect),
    Polygon { points: Vec<Point> },
}

impl Wall {
    /// Rectangles need positive finite extents, polygons at least three finite points
    pub fn is_valid(&self) -> bool {
        match self {
            Wall::Rect(r) => {
                r.x.is_finite() && r.y.is_finite() && r.w.is_finite() && r.h.is_finite() && r.w > 0.0 && r.h > 0.0
            }
            Wall::Polygon { points } => points.len() >= 3 && points.iter().all(Point::is_finite),
        }
    }

    pub fn bounds(&self) -> Aabb {
        match self {
            Wall::Rect(r) => Aabb {
                min_x: r.x,
                min_y: r.y,
                max_x: r.max_x(),
                max_y: r.max_y(),
            },
            Wall::Polygon { points } => points.iter().fold(
                Aabb {
                    min_x: f32::INFINITY,
                    min_y: f32::INFINITY,
                    max_x: f32::NEG_INFINITY,
                    max_y: f32::NEG_INFINITY,
                },
                |b, p| Aabb {
                    min_x: b.min_x.min(p.x),
                    min_y: b.min_y.min(p.y),
                    max_x: b.max_x.max(p.x),
                    max_y: b.max_y.max(p.y),
                },
            ),
        }
    }
}

/// A wall centerline, thickened into a polygon by the maze builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallPath {
    pub points: Vec<Point>,
    pub thickness: f32,
}

/// Where a mob of a given type lives
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobSpawn {
    pub x: f32,
    pub y: f32,
    pub mob_type: MobType,
}

/// Compact description of the arena, sent to clients on join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDescription {
    /// Full width/height; the playable area spans `[-size/2, size/2]` on both axes
    pub size: f32,
    #[serde(default)]
    pub paths: Vec<WallPath>,
    #[serde(default)]
    pub rects: Vec<Rect>,
    #[serde(default)]
    pub mob_spawns: Vec<MobSpawn>,
}

impl MapDescription {
    pub fn half_size(&self) -> f32 {
        self.size / 2.0
    }

    /// The built-in arena maze
    pub fn default_arena(size: f32) -> Self {
        let s = size / 2400.0;
        let p = |x: f32, y: f32| Point::new(x * s, y * s);
        let spawn = |x: f32, y: f32, mob_type| MobSpawn {
            x: x * s,
            y: y * s,
            mob_type,
        };
        let thickness = 40.0 * s;

        Self {
            size,
            paths: vec![
                WallPath {
                    points: vec![p(-800.0, -800.0), p(-800.0, -300.0), p(-400.0, -300.0)],
                    thickness,
                },
                WallPath {
                    points: vec![p(400.0, -900.0), p(400.0, -500.0), p(800.0, -500.0)],
                    thickness,
                },
                WallPath {
                    points: vec![p(-900.0, 300.0), p(-500.0, 500.0), p(-900.0, 700.0)],
                    thickness,
                },
                WallPath {
                    points: vec![p(300.0, 400.0), p(700.0, 400.0), p(700.0, 900.0)],
                    thickness,
                },
            ],
            rects: vec![
                Rect::new(-60.0 * s, -700.0 * s, 120.0 * s, 120.0 * s),
                Rect::new(-60.0 * s, 580.0 * s, 120.0 * s, 120.0 * s),
                Rect::new(900.0 * s, -60.0 * s, 120.0 * s, 120.0 * s),
                Rect::new(-1020.0 * s, -60.0 * s, 120.0 * s, 120.0 * s),
            ],
            mob_spawns: vec![
                spawn(-500.0, -600.0, MobType::Slime),
                spawn(-200.0, -400.0, MobType::Slime),
                spawn(300.0, -250.0, MobType::Slime),
                spawn(600.0, -800.0, MobType::Wolf),
                spawn(200.0, 800.0, MobType::Wolf),
                spawn(-300.0, 750.0, MobType::Wolf),
                spawn(950.0, 300.0, MobType::Brute),
                spawn(-650.0, 0.0, MobType::Brute),
            ],
        }
    }
}

/// Result of building the wall set
#[derive(Debug, Clone)]
pub struct Layout {
    pub walls: Vec<Wall>,
    pub used_fallback: bool,
}

/// Thicken a centerline into a closed polygon.
///
/// Each waypoint is offset by half the thickness along its normal; interior
/// waypoints use the re-normalized average of both adjacent segment normals
/// so the rails meet at turns. The left rail runs forward and the right rail
/// comes back reversed. Degenerate input yields an empty ring.
pub fn build_path_polygon(points: &[Point], thickness: f32) -> Vec<Point> {
    if points.len() < 2 || !thickness.is_finite() || thickness <= 0.0 {
        return Vec::new();
    }
    if !points.iter().all(Point::is_finite) {
        return Vec::new();
    }

    let mut segment_normals = Vec::with_capacity(points.len() - 1);
    for pair in points.windows(2) {
        let dx = pair[1].x - pair[0].x;
        let dy = pair[1].y - pair[0].y;
        let len = (dx * dx + dy * dy).sqrt();
        if len < MIN_NORMAL_LENGTH {
            return Vec::new();
        }
        segment_normals.push(Point::new(-dy / len, dx / len));
    }

    let last = points.len() - 1;
    let half = thickness / 2.0;
    let mut left = Vec::with_capacity(points.len());
    let mut right = Vec::with_capacity(points.len());

    for (i, p) in points.iter().enumerate() {
        let normal = if i == 0 {
            segment_normals[0]
        } else if i == last {
            segment_normals[last - 1]
        } else {
            let a = segment_normals[i - 1];
            let b = segment_normals[i];
            let (nx, ny) = (a.x + b.x, a.y + b.y);
            let len = (nx * nx + ny * ny).sqrt();
            if len < MIN_NORMAL_LENGTH {
                return Vec::new();
            }
            Point::new(nx / len, ny / len)
        };

        left.push(Point::new(p.x + normal.x * half, p.y + normal.y * half));
        right.push(Point::new(p.x - normal.x * half, p.y - normal.y * half));
    }

    right.reverse();
    left.extend(right);
    left
}

/// Hand-authored box ring with doors and pillars around the origin
pub fn fallback_walls(size: f32) -> Vec<Wall> {
    let s = (size / 2400.0).max(0.1);
    [
        // top
        (-700.0, -720.0, 600.0, 40.0),
        (100.0, -720.0, 600.0, 40.0),
        // bottom
        (-700.0, 680.0, 600.0, 40.0),
        (100.0, 680.0, 600.0, 40.0),
        // left
        (-720.0, -700.0, 40.0, 600.0),
        (-720.0, 100.0, 40.0, 600.0),
        // right
        (680.0, -700.0, 40.0, 600.0),
        (680.0, 100.0, 40.0, 600.0),
        // pillars
        (-300.0, -300.0, 60.0, 60.0),
        (240.0, -300.0, 60.0, 60.0),
        (-300.0, 240.0, 60.0, 60.0),
        (240.0, 240.0, 60.0, 60.0),
    ]
    .into_iter()
    .map(|(x, y, w, h)| Wall::Rect(Rect::new(x * s, y * s, w * s, h * s)))
    .collect()
}

/// Build every wall the description names, falling back to the box layout
/// if any path or rect is malformed or nothing would be built at all.
pub fn build_walls(desc: &MapDescription) -> Layout {
    let mut walls = Vec::with_capacity(desc.paths.len() + desc.rects.len());

    for (index, path) in desc.paths.iter().enumerate() {
        let ring = build_path_polygon(&path.points, path.thickness);
        if ring.len() < 3 {
            warn!(
                path_index = index,
                waypoints = path.points.len(),
                "Wall path generation failed, using fallback layout"
            );
            return fallback_layout(desc.size);
        }
        walls.push(Wall::Polygon { points: ring });
    }

    for rect in &desc.rects {
        let wall = Wall::Rect(*rect);
        if !wall.is_valid() {
            warn!(?rect, "Malformed rect wall, using fallback layout");
            return fallback_layout(desc.size);
        }
        walls.push(wall);
    }

    if walls.is_empty() {
        warn!("Map description has no walls, using fallback layout");
        return fallback_layout(desc.size);
    }

    Layout {
        walls,
        used_fallback: false,
    }
}

fn fallback_layout(size: f32) -> Layout {
    Layout {
        walls: fallback_walls(size),
        used_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn straight() -> Vec<Point> {
        vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]
    }

    #[test]
    fn test_straight_path_builds_rectangle_ring() {
        let ring = build_path_polygon(&straight(), 20.0);
        assert_eq!(
            ring,
            vec![
                Point::new(0.0, 10.0),
                Point::new(100.0, 10.0),
                Point::new(100.0, -10.0),
                Point::new(0.0, -10.0),
            ]
        );
    }

    #[test]
    fn test_turn_uses_averaged_normal() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
        ];
        let ring = build_path_polygon(&points, 20.0);
        assert_eq!(ring.len(), 6);

        // The corner offset lies on the diagonal between both segment normals
        let corner = ring[1];
        let expected = 10.0 / std::f32::consts::SQRT_2;
        assert!((corner.x - (100.0 - expected)).abs() < 1e-3);
        assert!((corner.y - expected).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_inputs_yield_empty_ring() {
        assert!(build_path_polygon(&[Point::new(1.0, 1.0)], 10.0).is_empty());
        assert!(build_path_polygon(&[Point::new(1.0, 1.0), Point::new(1.0, 1.0)], 10.0).is_empty());
        assert!(build_path_polygon(&straight(), 0.0).is_empty());

        // Full reversal cancels the averaged normal
        let reversal = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        assert!(build_path_polygon(&reversal, 10.0).is_empty());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let desc = MapDescription::default_arena(2400.0);
        let a = build_walls(&desc);
        let b = build_walls(&desc);
        assert_eq!(a.walls, b.walls);
        assert!(!a.used_fallback);
        assert_eq!(a.walls.len(), desc.paths.len() + desc.rects.len());
    }

    #[test]
    fn test_bad_path_triggers_fallback() {
        let mut desc = MapDescription::default_arena(2400.0);
        desc.paths.push(WallPath {
            points: vec![Point::new(5.0, 5.0)],
            thickness: 30.0,
        });
        let layout = build_walls(&desc);
        assert!(layout.used_fallback);
        assert_eq!(layout.walls, fallback_walls(2400.0));
    }

    #[test]
    fn test_empty_description_triggers_fallback() {
        let desc = MapDescription {
            size: 2400.0,
            paths: Vec::new(),
            rects: Vec::new(),
            mob_spawns: Vec::new(),
        };
        let layout = build_walls(&desc);
        assert!(layout.used_fallback);
        assert!(!layout.walls.is_empty());
    }

    #[test]
    fn test_polygon_bounds() {
        let wall = Wall::Polygon {
            points: build_path_polygon(&straight(), 20.0),
        };
        let b = wall.bounds();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, -10.0, 100.0, 10.0));
    }

    #[test]
    fn test_wall_serializes_with_kind_tag() {
        let json = serde_json::to_value(Wall::Rect(Rect::new(1.0, 2.0, 3.0, 4.0))).unwrap();
        assert_eq!(json["kind"], "rect");
        assert_eq!(json["w"], 3.0);
    }

    fn arb_point() -> impl Strategy<Value = Point> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    proptest! {
        #[test]
        fn prop_every_generated_wall_is_valid(
            paths in prop::collection::vec(
                (prop::collection::vec(arb_point(), 0..6), 1.0f32..80.0),
                0..5,
            )
        ) {
            let desc = MapDescription {
                size: 2400.0,
                paths: paths
                    .into_iter()
                    .map(|(points, thickness)| WallPath { points, thickness })
                    .collect(),
                rects: Vec::new(),
                mob_spawns: Vec::new(),
            };

            let any_short = desc
                .paths
                .iter()
                .any(|p| build_path_polygon(&p.points, p.thickness).len() < 3);

            let layout = build_walls(&desc);
            prop_assert!(!layout.walls.is_empty());
            prop_assert!(layout.walls.iter().all(Wall::is_valid));
            prop_assert_eq!(layout.used_fallback, any_short || desc.paths.is_empty());
        }
    }
}
