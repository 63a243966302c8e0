//! Spatial Index
//!
//! Uniform grid over actor positions for broad-phase proximity queries.
//! New actors are inserted as they are added; the grid is rebuilt once per
//! frame by the registry subsystem. Between rebuilds it may lag behind
//! movement and removals, so every query result is re-checked against the
//! registry by the caller.

use std::collections::BTreeMap;

use crate::core::vec2::{Vec2, Rect};
use crate::game::actor::ActorId;

/// Default cell edge length in world units.
pub const DEFAULT_CELL_SIZE: f32 = 256.0;

type CellKey = (i32, i32);

/// Uniform 2D grid of actor ids.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cell: f32,
    buckets: BTreeMap<CellKey, Vec<ActorId>>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialGrid {
    /// Empty grid with the given cell size (clamped to at least 1 unit).
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell: cell_size.max(1.0),
            buckets: BTreeMap::new(),
        }
    }

    /// Cell size in world units.
    pub fn cell_size(&self) -> f32 {
        self.cell
    }

    /// Replace the contents with the given `(id, position)` pairs.
    pub fn rebuild<I>(&mut self, actors: I)
    where
        I: IntoIterator<Item = (ActorId, Vec2)>,
    {
        self.buckets.clear();
        for (id, pos) in actors {
            if !pos.is_finite() {
                continue;
            }
            let key = self.key(pos);
            self.buckets.entry(key).or_default().push(id);
        }
    }

    /// Index one more actor without a full rebuild.
    pub fn insert(&mut self, id: ActorId, pos: Vec2) {
        if pos.is_finite() {
            let key = self.key(pos);
            self.buckets.entry(key).or_default().push(id);
        }
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// No ids indexed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn key(&self, pos: Vec2) -> CellKey {
        ((pos.x / self.cell).floor() as i32, (pos.y / self.cell).floor() as i32)
    }

    /// Candidate ids in every cell touched by the circle's bounding box.
    ///
    /// Superset of the true result; callers filter by exact distance.
    pub fn candidates_in_circle(&self, center: Vec2, radius: f32) -> Vec<ActorId> {
        let r = radius.max(0.0);
        self.candidates_between(
            self.key(Vec2::new(center.x - r, center.y - r)),
            self.key(Vec2::new(center.x + r, center.y + r)),
        )
    }

    /// Candidate ids in every cell overlapping `rect`.
    ///
    /// Boxes covering more cells than are occupied walk the occupied cells
    /// instead, so cost is bounded by the grid's contents.
    pub fn candidates_in_rect(&self, rect: Rect) -> Vec<ActorId> {
        self.candidates_between(
            self.key(Vec2::new(rect.x, rect.y)),
            self.key(Vec2::new(rect.x + rect.width, rect.y + rect.height)),
        )
    }

    fn candidates_between(&self, (min_x, min_y): CellKey, (max_x, max_y): CellKey) -> Vec<ActorId> {
        if min_x > max_x || min_y > max_y {
            return Vec::new();
        }

        let span_x = (i64::from(max_x) - i64::from(min_x) + 1) as u64;
        let span_y = (i64::from(max_y) - i64::from(min_y) + 1) as u64;

        let mut out = Vec::new();
        if span_x.saturating_mul(span_y) > self.buckets.len() as u64 {
            for (&(_, cy), ids) in self.buckets.range((min_x, i32::MIN)..=(max_x, i32::MAX)) {
                if (min_y..=max_y).contains(&cy) {
                    out.extend_from_slice(ids);
                }
            }
            return out;
        }

        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                if let Some(ids) = self.buckets.get(&(cx, cy)) {
                    out.extend_from_slice(ids);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_cover_neighbouring_cells() {
        let mut grid = SpatialGrid::new(100.0);
        grid.rebuild(vec![
            (ActorId(1), Vec2::new(10.0, 10.0)),
            (ActorId(2), Vec2::new(150.0, 10.0)),
            (ActorId(3), Vec2::new(950.0, 950.0)),
        ]);
        assert_eq!(grid.len(), 3);

        let found = grid.candidates_in_circle(Vec2::new(90.0, 10.0), 20.0);
        assert!(found.contains(&ActorId(1)));
        assert!(found.contains(&ActorId(2)));
        assert!(!found.contains(&ActorId(3)));
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialGrid::new(64.0);
        grid.rebuild(vec![(ActorId(7), Vec2::new(-5.0, -5.0))]);

        let found = grid.candidates_in_circle(Vec2::new(-1.0, -1.0), 2.0);
        assert_eq!(found, vec![ActorId(7)]);
    }

    #[test]
    fn test_insert_between_rebuilds() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(ActorId(4), Vec2::new(50.0, 50.0));
        assert_eq!(grid.candidates_in_circle(Vec2::new(50.0, 50.0), 1.0), vec![ActorId(4)]);
    }

    #[test]
    fn test_huge_radius_walks_occupied_cells() {
        let mut grid = SpatialGrid::new(100.0);
        grid.rebuild(vec![
            (ActorId(1), Vec2::new(10.0, 10.0)),
            (ActorId(2), Vec2::new(-90_000.0, 40_000.0)),
        ]);

        let mut found = grid.candidates_in_circle(Vec2::ZERO, 1.0e7);
        found.sort_unstable();
        assert_eq!(found, vec![ActorId(1), ActorId(2)]);

        let found = grid.candidates_in_circle(Vec2::ZERO, f32::INFINITY);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_wide_rect_keeps_cells_outside_rows() {
        let mut grid = SpatialGrid::new(100.0);
        grid.rebuild(vec![
            (ActorId(1), Vec2::new(50.0, 50.0)),
            (ActorId(2), Vec2::new(50.0, 5_000.0)),
        ]);

        // Thousands of columns, one row
        let found = grid.candidates_in_rect(Rect::new(-500_000.0, 0.0, 1_000_000.0, 99.0));
        assert_eq!(found, vec![ActorId(1)]);
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut grid = SpatialGrid::default();
        grid.rebuild(vec![(ActorId(1), Vec2::ZERO)]);
        grid.rebuild(vec![(ActorId(2), Vec2::ZERO), (ActorId(3), Vec2::new(f32::NAN, 0.0))]);

        assert_eq!(grid.candidates_in_circle(Vec2::ZERO, 1.0), vec![ActorId(2)]);
    }
}
