//! Grid snapping and alignment guides for dragged geometry.
//!
//! Alignment compares the moving box's left/center/right (and top/middle/
//! bottom) against the same anchors of every reference box. The nearest
//! match within tolerance on each axis wins and yields the adjustment; every
//! anchor pair that lines up after the adjustment becomes a guide line.

#[cfg(test)]
#[path = "snap_test.rs"]
mod snap_test;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

/// Matches closer than this are considered aligned when emitting guides.
const ALIGN_EPSILON: f64 = 1e-6;

/// Which snapping sources are active for a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapMode {
    /// No snapping.
    None,
    /// Snap the top-left corner to grid intersections.
    Grid,
    /// Snap to alignment with other objects.
    #[default]
    Guides,
    /// Guides first, grid for any axis guides left free.
    All,
}

impl SnapMode {
    #[must_use]
    pub fn snaps_to_grid(self) -> bool {
        matches!(self, Self::Grid | Self::All)
    }

    #[must_use]
    pub fn snaps_to_guides(self) -> bool {
        matches!(self, Self::Guides | Self::All)
    }
}

/// Orientation of a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideAxis {
    /// Line of constant x.
    Vertical,
    /// Line of constant y.
    Horizontal,
}

/// A guide line to draw while dragging, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideLine {
    pub axis: GuideAxis,
    /// x for vertical lines, y for horizontal ones.
    pub position: f64,
    /// Extent along the line, covering both aligned boxes.
    pub start: f64,
    pub end: f64,
}

/// Adjustment to add to the implied position, plus guides to show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapResult {
    pub dx: f64,
    pub dy: f64,
    pub guides: Vec<GuideLine>,
    pub snapped_x: bool,
    pub snapped_y: bool,
}

impl SnapResult {
    #[must_use]
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Round `value` to the nearest multiple of `grid_size`.
#[must_use]
pub fn snap_to_grid(value: f64, grid_size: f64) -> f64 {
    if grid_size > 0.0 { (value / grid_size).round() * grid_size } else { value }
}

/// Snap a point to the nearest grid intersection.
#[must_use]
pub fn snap_point_to_grid(point: Point, grid_size: f64) -> Point {
    Point::new(snap_to_grid(point.x, grid_size), snap_to_grid(point.y, grid_size))
}

/// Snap `moving` against `references` according to `mode`.
///
/// `tolerance` is in world units.
#[must_use]
pub fn snap_rect(moving: &Rect, references: &[Rect], mode: SnapMode, grid_size: f64, tolerance: f64) -> SnapResult {
    let mut result = SnapResult::default();

    if mode.snaps_to_guides() {
        if let Some(dx) = nearest_offset(x_anchors(moving), references.iter().map(x_anchors), tolerance) {
            result.dx = dx;
            result.snapped_x = true;
        }
        if let Some(dy) = nearest_offset(y_anchors(moving), references.iter().map(y_anchors), tolerance) {
            result.dy = dy;
            result.snapped_y = true;
        }
    }

    if mode.snaps_to_grid() {
        if !result.snapped_x {
            result.dx = snap_to_grid(moving.x, grid_size) - moving.x;
            result.snapped_x = true;
        }
        if !result.snapped_y {
            result.dy = snap_to_grid(moving.y, grid_size) - moving.y;
            result.snapped_y = true;
        }
    }

    if mode.snaps_to_guides() {
        let placed = moving.translate(result.dx, result.dy);
        result.guides = alignment_guides(&placed, references);
    }
    result
}

/// Guide lines for every anchor of `placed` that lines up exactly with a reference.
#[must_use]
pub fn alignment_guides(placed: &Rect, references: &[Rect]) -> Vec<GuideLine> {
    let mut guides: Vec<GuideLine> = Vec::new();
    for reference in references {
        for a in x_anchors(placed) {
            if x_anchors(reference).iter().any(|b| (a - b).abs() < ALIGN_EPSILON) {
                push_guide(&mut guides, GuideAxis::Vertical, a, placed.y.min(reference.y), placed.bottom().max(reference.bottom()));
            }
        }
        for a in y_anchors(placed) {
            if y_anchors(reference).iter().any(|b| (a - b).abs() < ALIGN_EPSILON) {
                push_guide(&mut guides, GuideAxis::Horizontal, a, placed.x.min(reference.x), placed.right().max(reference.right()));
            }
        }
    }
    guides
}

/// Merge with an existing guide on the same line, widening its extent.
fn push_guide(guides: &mut Vec<GuideLine>, axis: GuideAxis, position: f64, start: f64, end: f64) {
    if let Some(g) = guides
        .iter_mut()
        .find(|g| g.axis == axis && (g.position - position).abs() < ALIGN_EPSILON)
    {
        g.start = g.start.min(start);
        g.end = g.end.max(end);
        return;
    }
    guides.push(GuideLine { axis, position, start, end });
}

fn x_anchors(r: &Rect) -> [f64; 3] {
    [r.x, r.x + r.width / 2.0, r.right()]
}

fn y_anchors(r: &Rect) -> [f64; 3] {
    [r.y, r.y + r.height / 2.0, r.bottom()]
}

/// Smallest signed offset that brings one of `ours` onto one of `theirs`.
fn nearest_offset(ours: [f64; 3], theirs: impl Iterator<Item = [f64; 3]>, tolerance: f64) -> Option<f64> {
    let mut best: Option<f64> = None;
    for target in theirs {
        for t in target {
            for a in ours {
                let d = t - a;
                if d.abs() <= tolerance && best.is_none_or(|b| d.abs() < b.abs()) {
                    best = Some(d);
                }
            }
        }
    }
    best
}
