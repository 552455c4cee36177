//! Collision tests and push-out resolution against static walls

use super::geometry::{Point, Rect, Wall};

/// Overlaps shallower than this are treated as touching
pub const CONTACT_EPSILON: f32 = 1e-3;

/// Passes over the candidate walls per resolution
const MAX_RESOLVE_PASSES: usize = 4;

/// Correction for one circle against one obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub push_x: f32,
    pub push_y: f32,
    /// Set when the center was inside the obstacle and was pushed out along an axis
    pub stop_x: bool,
    pub stop_y: bool,
}

impl Contact {
    fn push(push_x: f32, push_y: f32) -> Self {
        Self {
            push_x,
            push_y,
            stop_x: false,
            stop_y: false,
        }
    }
}

/// Physics system for entity movement against the map
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate a position by a velocity
    pub fn integrate(x: f32, y: f32, vel_x: f32, vel_y: f32, dt: f32) -> (f32, f32) {
        (x + vel_x * dt, y + vel_y * dt)
    }

    /// Scale a direction so it never exceeds unit length; zero stays zero
    pub fn normalize_intent(x: f32, y: f32) -> (f32, f32) {
        let len = (x * x + y * y).sqrt();
        if len > 1.0 {
            (x / len, y / len)
        } else {
            (x, y)
        }
    }

    /// Unit direction, or `None` for a zero-length vector
    pub fn unit(x: f32, y: f32) -> Option<(f32, f32)> {
        let len = (x * x + y * y).sqrt();
        if len > f32::EPSILON && len.is_finite() {
            Some((x / len, y / len))
        } else {
            None
        }
    }

    /// Keep a circle inside the square map
    pub fn clamp_to_bounds(x: f32, y: f32, radius: f32, half_size: f32) -> (f32, f32) {
        let limit = (half_size - radius).max(0.0);
        (x.clamp(-limit, limit), y.clamp(-limit, limit))
    }

    /// Whether a point is outside the square map
    pub fn out_of_bounds(x: f32, y: f32, half_size: f32) -> bool {
        x.abs() > half_size || y.abs() > half_size
    }

    /// Check overlap between two circles
    pub fn circles_overlap(x1: f32, y1: f32, radius1: f32, x2: f32, y2: f32, radius2: f32) -> bool {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let combined_radius = radius1 + radius2;
        dx * dx + dy * dy <= combined_radius * combined_radius
    }

    /// Horizontal ray cast: count edge crossings to the right of the point
    pub fn point_in_polygon(x: f32, y: f32, points: &[Point]) -> bool {
        if points.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = points.len() - 1;
        for i in 0..points.len() {
            let (a, b) = (points[i], points[j]);
            if (a.y > y) != (b.y > y) {
                let cross_x = a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x);
                if x < cross_x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Exact overlap test, used for projectiles and spawn validation
    pub fn circle_overlaps_wall(x: f32, y: f32, radius: f32, wall: &Wall) -> bool {
        match wall {
            Wall::Rect(r) => {
                let cx = x.clamp(r.x, r.max_x());
                let cy = y.clamp(r.y, r.max_y());
                let (dx, dy) = (x - cx, y - cy);
                dx * dx + dy * dy <= radius * radius
            }
            Wall::Polygon { points } => {
                Self::point_in_polygon(x, y, points)
                    || Self::nearest_edge_point(x, y, points)
                        .map(|(_, d)| d <= radius)
                        .unwrap_or(false)
            }
        }
    }

    /// Circle vs axis-aligned rectangle.
    ///
    /// Outside: push along the closest-point normal by `radius - distance`.
    /// Center inside: push out through the edge of least penetration and
    /// stop motion on that axis.
    pub fn circle_rect_contact(x: f32, y: f32, radius: f32, rect: &Rect) -> Option<Contact> {
        let cx = x.clamp(rect.x, rect.max_x());
        let cy = y.clamp(rect.y, rect.max_y());
        let dx = x - cx;
        let dy = y - cy;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist > 0.0 {
            if dist >= radius - CONTACT_EPSILON {
                return None;
            }
            let push = radius - dist;
            return Some(Contact::push(dx / dist * push, dy / dist * push));
        }

        let left = x - rect.x;
        let right = rect.max_x() - x;
        let top = y - rect.y;
        let bottom = rect.max_y() - y;
        let min = left.min(right).min(top).min(bottom);

        let contact = if min == left {
            Contact {
                push_x: -(left + radius),
                push_y: 0.0,
                stop_x: true,
                stop_y: false,
            }
        } else if min == right {
            Contact {
                push_x: right + radius,
                push_y: 0.0,
                stop_x: true,
                stop_y: false,
            }
        } else if min == top {
            Contact {
                push_x: 0.0,
                push_y: -(top + radius),
                stop_x: false,
                stop_y: true,
            }
        } else {
            Contact {
                push_x: 0.0,
                push_y: bottom + radius,
                stop_x: false,
                stop_y: true,
            }
        };
        Some(contact)
    }

    /// Circle vs simple polygon by projection onto the nearest edge
    pub fn circle_polygon_contact(x: f32, y: f32, radius: f32, points: &[Point]) -> Option<Contact> {
        let (closest, dist) = Self::nearest_edge_point(x, y, points)?;

        if dist > CONTACT_EPSILON {
            if !Self::point_in_polygon(x, y, points) {
                if dist >= radius - CONTACT_EPSILON {
                    return None;
                }
                let push = radius - dist;
                return Some(Contact::push(
                    (x - closest.x) / dist * push,
                    (y - closest.y) / dist * push,
                ));
            }
            let push = dist + radius;
            return Some(Contact::push(
                (closest.x - x) / dist * push,
                (closest.y - y) / dist * push,
            ));
        }

        // Center on an edge, where the ray cast is unreliable: step along the
        // edge normal that leaves the polygon
        let (nx, ny) = Self::nearest_edge_normal(x, y, points)?;
        let probe = radius.max(1.0);
        let sign = if Self::point_in_polygon(x + nx * probe, y + ny * probe, points) {
            -1.0
        } else {
            1.0
        };
        Some(Contact::push(nx * sign * radius, ny * sign * radius))
    }

    pub fn wall_contact(x: f32, y: f32, radius: f32, wall: &Wall) -> Option<Contact> {
        match wall {
            Wall::Rect(rect) => Self::circle_rect_contact(x, y, radius, rect),
            Wall::Polygon { points } => Self::circle_polygon_contact(x, y, radius, points),
        }
    }

    /// Push a circle out of every candidate wall it overlaps.
    /// Returns (new_x, new_y, new_vel_x, new_vel_y).
    pub fn resolve_walls(
        x: f32,
        y: f32,
        vel_x: f32,
        vel_y: f32,
        radius: f32,
        walls: &[Wall],
        candidates: &[usize],
    ) -> (f32, f32, f32, f32) {
        let (mut x, mut y, mut vel_x, mut vel_y) = (x, y, vel_x, vel_y);

        for _ in 0..MAX_RESOLVE_PASSES {
            let mut moved = false;
            for wall in candidates.iter().filter_map(|&i| walls.get(i)) {
                if let Some(contact) = Self::wall_contact(x, y, radius, wall) {
                    x += contact.push_x;
                    y += contact.push_y;
                    if contact.stop_x {
                        vel_x = 0.0;
                    }
                    if contact.stop_y {
                        vel_y = 0.0;
                    }
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }

        (x, y, vel_x, vel_y)
    }

    /// Closest point on the polygon boundary and its distance
    fn nearest_edge_point(x: f32, y: f32, points: &[Point]) -> Option<(Point, f32)> {
        Self::edges(points)
            .map(|(a, b)| {
                let q = Self::closest_on_segment(x, y, a, b);
                let (dx, dy) = (x - q.x, y - q.y);
                (q, (dx * dx + dy * dy).sqrt())
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn nearest_edge_normal(x: f32, y: f32, points: &[Point]) -> Option<(f32, f32)> {
        let (a, b) = Self::edges(points).min_by(|e1, e2| {
            let d1 = Self::segment_distance_sq(x, y, e1.0, e1.1);
            let d2 = Self::segment_distance_sq(x, y, e2.0, e2.1);
            d1.total_cmp(&d2)
        })?;
        Self::unit(-(b.y - a.y), b.x - a.x)
    }

    fn edges(points: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = points.len();
        (0..n).map(move |i| (points[i], points[(i + 1) % n]))
    }

    fn segment_distance_sq(x: f32, y: f32, a: Point, b: Point) -> f32 {
        let q = Self::closest_on_segment(x, y, a, b);
        (x - q.x) * (x - q.x) + (y - q.y) * (y - q.y)
    }

    fn closest_on_segment(x: f32, y: f32, a: Point, b: Point) -> Point {
        let (abx, aby) = (b.x - a.x, b.y - a.y);
        let len_sq = abx * abx + aby * aby;
        if len_sq <= f32::EPSILON {
            return a;
        }
        let t = (((x - a.x) * abx + (y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
        Point::new(a.x + abx * t, a.y + aby * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::build_path_polygon;
    use proptest::prelude::*;

    fn rect_distance(x: f32, y: f32, rect: &Rect) -> f32 {
        let cx = x.clamp(rect.x, rect.max_x());
        let cy = y.clamp(rect.y, rect.max_y());
        ((x - cx).powi(2) + (y - cy).powi(2)).sqrt()
    }

    #[test]
    fn test_no_contact_when_clear() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(PhysicsSystem::circle_rect_contact(-50.0, 50.0, 20.0, &rect).is_none());
    }

    #[test]
    fn test_outside_overlap_pushes_along_normal() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        let contact = PhysicsSystem::circle_rect_contact(-10.0, 50.0, 20.0, &rect).unwrap();
        assert!((contact.push_x + 10.0).abs() < 1e-4);
        assert_eq!(contact.push_y, 0.0);
        assert!(!contact.stop_x);
    }

    #[test]
    fn test_inside_pushes_through_least_penetration_and_stops_axis() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        // Closest to the right edge
        let (x, y, vx, vy) = PhysicsSystem::resolve_walls(
            90.0,
            40.0,
            -50.0,
            30.0,
            15.0,
            &[Wall::Rect(rect)],
            &[0],
        );
        assert!((x - 115.0).abs() < 1e-4);
        assert_eq!(y, 40.0);
        assert_eq!(vx, 0.0);
        assert_eq!(vy, 30.0);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let walls = [Wall::Rect(Rect::new(0.0, 0.0, 100.0, 100.0))];
        let once = PhysicsSystem::resolve_walls(-5.0, 20.0, 0.0, 0.0, 12.0, &walls, &[0]);
        let twice = PhysicsSystem::resolve_walls(once.0, once.1, once.2, once.3, 12.0, &walls, &[0]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(PhysicsSystem::point_in_polygon(5.0, 5.0, &square));
        assert!(!PhysicsSystem::point_in_polygon(15.0, 5.0, &square));
        assert!(!PhysicsSystem::point_in_polygon(5.0, -1.0, &square));
    }

    #[test]
    fn test_circle_pushed_out_of_corridor_polygon() {
        let ring = build_path_polygon(&[Point::new(0.0, 0.0), Point::new(200.0, 0.0)], 40.0);
        let walls = [Wall::Polygon { points: ring.clone() }];

        // Inside the band, nearer the top rail
        let (x, y, _, _) = PhysicsSystem::resolve_walls(100.0, 12.0, 0.0, 0.0, 10.0, &walls, &[0]);
        assert!(!PhysicsSystem::point_in_polygon(x, y, &ring));
        assert!((y - 30.0).abs() < 1e-3);

        // Grazing from outside
        let (_, y, _, _) = PhysicsSystem::resolve_walls(100.0, -25.0, 0.0, 0.0, 10.0, &walls, &[0]);
        assert!((y + 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_center_on_polygon_edge_is_pushed_out() {
        let ring = build_path_polygon(&[Point::new(0.0, 0.0), Point::new(200.0, 0.0)], 40.0);
        let walls = [Wall::Polygon { points: ring.clone() }];

        // Exactly on the top rail
        let (x, y, _, vy) = PhysicsSystem::resolve_walls(100.0, 20.0, 0.0, -100.0, 10.0, &walls, &[0]);
        assert_eq!(x, 100.0);
        assert!((y - 30.0).abs() < 1e-3);
        assert!(!PhysicsSystem::point_in_polygon(x, y, &ring));
        assert!(PhysicsSystem::circle_polygon_contact(x, y, 10.0, &ring).is_none());
        assert_eq!(vy, -100.0);

        // Exactly on the bottom rail
        let (_, y, _, _) = PhysicsSystem::resolve_walls(50.0, -20.0, 0.0, 0.0, 10.0, &walls, &[0]);
        assert!((y + 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_clamp_to_bounds_exact() {
        let (x, y) = PhysicsSystem::clamp_to_bounds(1250.0, -1300.0, 18.0, 1200.0);
        assert_eq!(x, 1182.0);
        assert_eq!(y, -1182.0);
    }

    #[test]
    fn test_normalize_intent() {
        let (x, y) = PhysicsSystem::normalize_intent(3.0, 4.0);
        assert!((x - 0.6).abs() < 1e-6 && (y - 0.8).abs() < 1e-6);
        assert_eq!(PhysicsSystem::normalize_intent(0.5, 0.0), (0.5, 0.0));
        assert_eq!(PhysicsSystem::normalize_intent(0.0, 0.0), (0.0, 0.0));
    }

    proptest! {
        #[test]
        fn prop_no_residual_rect_penetration(
            rx in -500.0f32..500.0,
            ry in -500.0f32..500.0,
            w in 1.0f32..300.0,
            h in 1.0f32..300.0,
            x in -700.0f32..700.0,
            y in -700.0f32..700.0,
            radius in 1.0f32..60.0,
        ) {
            let rect = Rect::new(rx, ry, w, h);
            let (nx, ny, _, _) =
                PhysicsSystem::resolve_walls(x, y, 0.0, 0.0, radius, &[Wall::Rect(rect)], &[0]);
            prop_assert!(rect_distance(nx, ny, &rect) >= radius - 0.01);
        }
    }
}
