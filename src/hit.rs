//! Hit-testing against board objects.
//!
//! Candidates come from the spatial index; exact tests run against each
//! candidate's bounding box. Thin shapes (connectors, freehand strokes) get
//! `slop` world units of tolerance so they stay clickable.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::doc::{BoardObject, DocStore, ObjectId};
use crate::geometry::{Point, Rect};

/// What a pointer-down landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    /// A specific object body.
    Object(ObjectId),
    /// Inside the bounding handle of a multi-selection.
    SelectionBounds,
}

/// Topmost object under `world_pt`, by `(z_index, id)`.
#[must_use]
pub fn hit_test(doc: &DocStore, world_pt: Point, slop: f64) -> Option<ObjectId> {
    let probe = Rect::new(world_pt.x, world_pt.y, 0.0, 0.0).inflate(slop.max(0.0));
    doc.candidates(&probe)
        .iter()
        .filter_map(|id| doc.get(id))
        .filter(|obj| hit_bounds(obj, slop).contains(world_pt))
        .max_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)))
        .map(|obj| obj.id)
}

/// Resolve a pointer-down against the current selection.
///
/// A multi-selection's bounding box wins over whatever lies inside it, so
/// pressing anywhere within it drags the whole group.
#[must_use]
pub fn pick(doc: &DocStore, world_pt: Point, slop: f64, selection: &[ObjectId]) -> Option<Hit> {
    if selection.len() > 1 {
        if let Some(bounds) = selection_bounds(doc, selection) {
            if bounds.inflate(slop.max(0.0)).contains(world_pt) {
                return Some(Hit::SelectionBounds);
            }
        }
    }
    hit_test(doc, world_pt, slop).map(Hit::Object)
}

/// Union of the bounding boxes of every live id in `ids`.
#[must_use]
pub fn selection_bounds(doc: &DocStore, ids: &[ObjectId]) -> Option<Rect> {
    ids.iter()
        .filter_map(|id| doc.get(id))
        .map(BoardObject::bounds)
        .reduce(|acc, b| acc.union(&b))
}

/// Ids whose bounds lie entirely inside `area` (marquee selection), in draw order.
#[must_use]
pub fn enclosed_by(doc: &DocStore, area: &Rect) -> Vec<ObjectId> {
    doc.objects_in(area)
        .into_iter()
        .filter(|obj| {
            let b = obj.bounds();
            area.contains(Point::new(b.x, b.y)) && area.contains(Point::new(b.right(), b.bottom()))
        })
        .map(|obj| obj.id)
        .collect()
}

fn hit_bounds(obj: &BoardObject, slop: f64) -> Rect {
    let b = obj.bounds();
    if obj.kind().is_path() { b.inflate(slop.max(0.0)) } else { b }
}
