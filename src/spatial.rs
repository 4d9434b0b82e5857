//! Grid-hash spatial index over object bounding boxes.
//!
//! DESIGN
//! ======
//! World space is cut into square cells of `cell_size`. Each cell keeps the
//! ids whose bounding box overlaps it, and each id remembers the cells it was
//! stamped into so removal touches only those cells. Objects that would
//! cover more than [`MAX_CELLS_PER_OBJECT`] cells are parked in an oversized
//! list and bounds-checked on every query instead.
//!
//! Queries return candidates: cell-level overlap only. Exact shape tests
//! belong to the caller.

#[cfg(test)]
#[path = "spatial_test.rs"]
mod spatial_test;

use std::collections::{HashMap, HashSet};

use crate::consts::{DEFAULT_CELL_SIZE, MAX_CELLS_PER_OBJECT};
use crate::doc::ObjectId;
use crate::geometry::Rect;

/// Integer cell coordinate.
pub type CellKey = (i64, i64);

#[derive(Debug, Clone, PartialEq)]
enum Occupancy {
    Cells(Vec<CellKey>),
    Oversized(Rect),
}

/// Inclusive range of cells covered by a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl CellRange {
    fn count(self) -> u128 {
        let w = u128::try_from(i128::from(self.x1) - i128::from(self.x0) + 1).unwrap_or(0);
        let h = u128::try_from(i128::from(self.y1) - i128::from(self.y0) + 1).unwrap_or(0);
        w.saturating_mul(h)
    }

    fn contains(self, key: CellKey) -> bool {
        key.0 >= self.x0 && key.0 <= self.x1 && key.1 >= self.y0 && key.1 <= self.y1
    }

    fn keys(self) -> impl Iterator<Item = CellKey> {
        (self.x0..=self.x1).flat_map(move |cx| (self.y0..=self.y1).map(move |cy| (cx, cy)))
    }
}

/// Fixed-cell grid index mapping world regions to object ids.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<CellKey, HashSet<ObjectId>>,
    occupied: HashMap<ObjectId, Occupancy>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialIndex {
    /// Create an empty index. Non-positive or non-finite sizes fall back to the default.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { DEFAULT_CELL_SIZE };
        Self { cell_size, cells: HashMap::new(), occupied: HashMap::new() }
    }

    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Index `id` under `bounds`. An id that is already present is moved.
    pub fn insert(&mut self, id: ObjectId, bounds: Rect) {
        self.remove(&id);
        let range = self.range_for(&bounds);
        if range.count() > MAX_CELLS_PER_OBJECT as u128 {
            self.occupied.insert(id, Occupancy::Oversized(bounds));
            return;
        }
        let keys: Vec<CellKey> = range.keys().collect();
        for key in &keys {
            self.cells.entry(*key).or_default().insert(id);
        }
        self.occupied.insert(id, Occupancy::Cells(keys));
    }

    /// Equivalent to remove followed by insert.
    pub fn update(&mut self, id: ObjectId, bounds: Rect) {
        self.insert(id, bounds);
    }

    /// Drop `id` from every cell it occupies. Returns whether it was indexed.
    pub fn remove(&mut self, id: &ObjectId) -> bool {
        let Some(occupancy) = self.occupied.remove(id) else {
            return false;
        };
        if let Occupancy::Cells(keys) = occupancy {
            for key in keys {
                if let Some(set) = self.cells.get_mut(&key) {
                    set.remove(id);
                    if set.is_empty() {
                        self.cells.remove(&key);
                    }
                }
            }
        }
        true
    }

    /// Candidate ids whose indexed cells overlap `bounds`. Each id appears once.
    #[must_use]
    pub fn query(&self, bounds: &Rect) -> HashSet<ObjectId> {
        let mut out = HashSet::new();
        let range = self.range_for(bounds);

        // Huge viewports: walking the occupied cells beats walking the range.
        if range.count() > self.cells.len() as u128 {
            for (key, ids) in &self.cells {
                if range.contains(*key) {
                    out.extend(ids.iter().copied());
                }
            }
        } else {
            for key in range.keys() {
                if let Some(ids) = self.cells.get(&key) {
                    out.extend(ids.iter().copied());
                }
            }
        }

        for (id, occupancy) in &self.occupied {
            if let Occupancy::Oversized(rect) = occupancy {
                if rect.intersects(bounds) {
                    out.insert(*id);
                }
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.occupied.clear();
    }

    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.occupied.contains_key(id)
    }

    /// Number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    /// Every indexed id, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.occupied.keys()
    }

    /// Cells currently holding `id`. Empty for unknown or oversized ids.
    #[must_use]
    pub fn cells_of(&self, id: &ObjectId) -> Vec<CellKey> {
        match self.occupied.get(id) {
            Some(Occupancy::Cells(keys)) => keys.clone(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_oversized(&self, id: &ObjectId) -> bool {
        matches!(self.occupied.get(id), Some(Occupancy::Oversized(_)))
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    fn range_for(&self, bounds: &Rect) -> CellRange {
        CellRange {
            x0: self.cell_coord(bounds.x),
            y0: self.cell_coord(bounds.y),
            x1: self.cell_coord(bounds.right()),
            y1: self.cell_coord(bounds.bottom()),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_coord(&self, v: f64) -> i64 {
        // `as` saturates, so an absurd coordinate lands in an edge cell instead of wrapping.
        (v / self.cell_size).floor() as i64
    }
}
