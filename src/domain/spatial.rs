//! Uniform-grid broadphase for hit tests.
//!
//! Rebuilt once per tick from the live targets, so projectile checks only touch the cells
//! around each swept segment instead of every player in the world.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetRef {
    Player(u64),
    Hostile(u32),
}

#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<TargetRef>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: HashMap::new(),
        }
    }

    #[inline]
    fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, target: TargetRef, x: f32, y: f32) {
        let cell = self.cell_of(x, y);
        self.cells.entry(cell).or_default().push(target);
    }

    /// Targets whose cell overlaps the box around the segment, padded by `reach`.
    /// Sorted so callers resolve hits in a stable order.
    pub fn query_segment(&self, from: (f32, f32), to: (f32, f32), reach: f32) -> Vec<TargetRef> {
        let (min_x, max_x) = (from.0.min(to.0) - reach, from.0.max(to.0) + reach);
        let (min_y, max_y) = (from.1.min(to.1) - reach, from.1.max(to.1) + reach);
        let (cx0, cy0) = self.cell_of(min_x, min_y);
        let (cx1, cy1) = self.cell_of(max_x, max_y);

        let mut found = Vec::new();
        for cx in cx0..=cx1 {
            for cy in cy0..=cy1 {
                if let Some(entries) = self.cells.get(&(cx, cy)) {
                    found.extend_from_slice(entries);
                }
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<TargetRef> {
        self.query_segment((x, y), (x, y), radius)
    }
}

/// Squared distance from `point` to the segment `a..b`, with the closest parameter in `[0, 1]`.
pub fn segment_point_distance_sq(a: (f32, f32), b: (f32, f32), point: (f32, f32)) -> (f32, f32) {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((point.0 - a.0) * abx + (point.1 - a.1) * aby) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.0 + abx * t;
    let cy = a.1 + aby * t;
    let dx = point.0 - cx;
    let dy = point.1 - cy;
    (dx * dx + dy * dy, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_target_is_near_segment_then_query_finds_it() {
        let mut grid = SpatialGrid::new(64.0);
        grid.insert(TargetRef::Player(1), 300.0, 100.0);
        grid.insert(TargetRef::Player(2), 2000.0, 2000.0);
        let found = grid.query_segment((0.0, 100.0), (600.0, 100.0), 30.0);
        assert_eq!(found, vec![TargetRef::Player(1)]);
    }

    #[test]
    fn when_point_is_beside_segment_then_distance_is_perpendicular() {
        let (dist_sq, t) = segment_point_distance_sq((0.0, 0.0), (10.0, 0.0), (5.0, 3.0));
        assert!((dist_sq - 9.0).abs() < 1e-5);
        assert!((t - 0.5).abs() < 1e-5);
    }

    #[test]
    fn when_segment_is_degenerate_then_distance_is_to_endpoint() {
        let (dist_sq, t) = segment_point_distance_sq((1.0, 1.0), (1.0, 1.0), (4.0, 5.0));
        assert_eq!(dist_sq, 25.0);
        assert_eq!(t, 0.0);
    }
}
