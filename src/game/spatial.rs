//! Uniform grid broad phase over the static walls

use super::geometry::Wall;

/// Number of cells along each axis of the map
pub const GRID_DIVISIONS: usize = 12;

/// Uniform grid of wall indices covering `[-half, half]` on both axes
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    half_size: f32,
    cell_size: f32,
    cols: usize,
    cells: Vec<Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(map_size: f32) -> Self {
        let cols = GRID_DIVISIONS;
        Self {
            half_size: map_size / 2.0,
            cell_size: (map_size / cols as f32).max(1.0),
            cols,
            cells: vec![Vec::new(); cols * cols],
        }
    }

    /// Clear and insert every wall into each cell its bounding box overlaps
    pub fn build(&mut self, walls: &[Wall]) {
        for cell in &mut self.cells {
            cell.clear();
        }

        for (index, wall) in walls.iter().enumerate() {
            let b = wall.bounds();
            let (c0, r0) = self.cell_of(b.min_x, b.min_y);
            let (c1, r1) = self.cell_of(b.max_x, b.max_y);
            for row in r0..=r1 {
                for col in c0..=c1 {
                    self.cells[row * self.cols + col].push(index);
                }
            }
        }
    }

    /// Wall indices near a circle; may contain false positives, never misses one
    pub fn query(&self, x: f32, y: f32, radius: f32) -> Vec<usize> {
        let (col, row) = self.cell_of(x, y);
        let reach = (radius.max(0.0) / self.cell_size).ceil() as usize + 1;

        let last = self.cols - 1;
        let mut found = Vec::new();
        for r in row.saturating_sub(reach)..=(row + reach).min(last) {
            for c in col.saturating_sub(reach)..=(col + reach).min(last) {
                found.extend_from_slice(&self.cells[r * self.cols + c]);
            }
        }

        found.sort_unstable();
        found.dedup();
        found
    }

    /// Cell coordinates for a point, clamped onto the grid
    fn cell_of(&self, x: f32, y: f32) -> (usize, usize) {
        let last = (self.cols - 1) as f32;
        let col = ((x + self.half_size) / self.cell_size).floor();
        let row = ((y + self.half_size) / self.cell_size).floor();
        // NaN clamps to 0 through the `as` cast
        (col.clamp(0.0, last) as usize, row.clamp(0.0, last) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::{build_path_polygon, Point, Rect};
    use crate::game::physics::PhysicsSystem;
    use proptest::prelude::*;

    #[test]
    fn test_query_finds_nearby_and_skips_far_walls() {
        let walls = vec![
            Wall::Rect(Rect::new(0.0, 0.0, 50.0, 50.0)),
            Wall::Rect(Rect::new(1000.0, 1000.0, 50.0, 50.0)),
        ];
        let mut grid = SpatialGrid::new(2400.0);
        grid.build(&walls);

        assert_eq!(grid.query(10.0, 10.0, 20.0), vec![0]);
        assert_eq!(grid.query(1020.0, 1020.0, 20.0), vec![1]);
    }

    #[test]
    fn test_query_deduplicates_spanning_walls() {
        // Spans many cells
        let walls = vec![Wall::Rect(Rect::new(-1000.0, -10.0, 2000.0, 20.0))];
        let mut grid = SpatialGrid::new(2400.0);
        grid.build(&walls);
        assert_eq!(grid.query(0.0, 0.0, 500.0), vec![0]);
    }

    #[test]
    fn test_rebuild_clears_previous_walls() {
        let mut grid = SpatialGrid::new(2400.0);
        grid.build(&[Wall::Rect(Rect::new(0.0, 0.0, 10.0, 10.0))]);
        grid.build(&[]);
        assert!(grid.query(0.0, 0.0, 50.0).is_empty());
    }

    #[test]
    fn test_out_of_map_points_are_clamped() {
        let walls = vec![Wall::Rect(Rect::new(1150.0, 1150.0, 40.0, 40.0))];
        let mut grid = SpatialGrid::new(2400.0);
        grid.build(&walls);
        assert_eq!(grid.query(5000.0, 5000.0, 10.0), vec![0]);
    }

    fn arb_rect() -> impl Strategy<Value = Wall> {
        (-1200.0f32..1100.0, -1200.0f32..1100.0, 1.0f32..300.0, 1.0f32..300.0)
            .prop_map(|(x, y, w, h)| Wall::Rect(Rect::new(x, y, w, h)))
    }

    fn arb_path() -> impl Strategy<Value = Wall> {
        (
            prop::collection::vec((-1100.0f32..1100.0, -1100.0f32..1100.0), 2..5),
            4.0f32..80.0,
        )
            .prop_filter_map("degenerate path", |(waypoints, thickness)| {
                let waypoints: Vec<Point> = waypoints.into_iter().map(|(x, y)| Point::new(x, y)).collect();
                let points = build_path_polygon(&waypoints, thickness);
                (!points.is_empty()).then_some(Wall::Polygon { points })
            })
    }

    fn arb_wall() -> impl Strategy<Value = Wall> {
        prop_oneof![arb_rect(), arb_path()]
    }

    proptest! {
        #[test]
        fn prop_query_is_superset_of_brute_force(
            walls in prop::collection::vec(arb_wall(), 0..40),
            x in -1200.0f32..1200.0,
            y in -1200.0f32..1200.0,
            radius in 0.0f32..400.0,
        ) {
            let mut grid = SpatialGrid::new(2400.0);
            grid.build(&walls);
            let candidates = grid.query(x, y, radius);

            for (index, wall) in walls.iter().enumerate() {
                if PhysicsSystem::circle_overlaps_wall(x, y, radius, wall) {
                    prop_assert!(
                        candidates.contains(&index),
                        "wall {} overlaps ({}, {}, r={}) but was not returned", index, x, y, radius
                    );
                }
            }
        }
    }
}
