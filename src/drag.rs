//! Drag gestures: snapping, drop-target preview and the final commit plan.
//!
//! DESIGN
//! ======
//! A gesture follows a seed/apply/commit lifecycle. `begin` snapshots the
//! starting geometry of every dragged object. `update` turns the pointer
//! position into one shared (dx, dy), snapped against visible non-dragged
//! objects, without touching the store; the caller feeds the result into
//! the transient offset holders. `end` turns the final offset into one
//! sparse update per moved object, with `parent_frame_id` resolved by the
//! containment rule. The live drop target runs the same resolution and only
//! names a frame when every re-resolved object would land in it.
//!
//! Dragging a frame carries its direct children along. Carried children
//! keep their parent; everything else the user picked up is re-resolved.
//!
//! CONTAINMENT
//! ===========
//! An object is inside a frame when its bounding-box center lies within the
//! frame's bounds (edges inclusive). The smallest-area frame wins; exact
//! area ties go to the higher `z_index`, then the larger id. A frame never
//! contains itself.

#[cfg(test)]
#[path = "drag_test.rs"]
mod drag_test;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::consts::COMMIT_EPSILON;
use crate::doc::{DocStore, ObjectId, ObjectKind, PartialBoardObject};
use crate::geometry::{Point, Rect};
use crate::snap::{GuideLine, SnapMode, snap_rect};

// =============================================================================
// CONTAINMENT
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct FrameCandidate {
    id: ObjectId,
    bounds: Rect,
    z_index: i64,
}

/// Frame that should own an object with `bounds`, or `None` for the canvas root.
#[must_use]
pub fn resolve_parent_frame(doc: &DocStore, bounds: &Rect, exclude: Option<ObjectId>) -> Option<ObjectId> {
    let center = bounds.center();
    let candidates = frames_at(doc, center, &HashSet::new(), 0.0, 0.0);
    smallest_containing(candidates, center, exclude)
}

/// Frames whose bounds contain `center`. Frames in `moved` are tested at
/// their position shifted by (dx, dy) instead of their stored one.
fn frames_at(doc: &DocStore, center: Point, moved: &HashSet<ObjectId>, dx: f64, dy: f64) -> Vec<FrameCandidate> {
    let probe = Rect::new(center.x, center.y, 0.0, 0.0);
    let mut out: Vec<FrameCandidate> = doc
        .candidates(&probe)
        .iter()
        .filter(|id| !moved.contains(*id))
        .filter_map(|id| doc.get(id))
        .filter(|o| o.kind().is_frame())
        .map(|o| FrameCandidate { id: o.id, bounds: o.bounds(), z_index: o.z_index })
        .collect();
    out.extend(
        moved
            .iter()
            .filter_map(|id| doc.get(id))
            .filter(|o| o.kind().is_frame())
            .map(|o| FrameCandidate { id: o.id, bounds: o.bounds().translate(dx, dy), z_index: o.z_index }),
    );
    out
}

fn smallest_containing(
    candidates: impl IntoIterator<Item = FrameCandidate>,
    center: Point,
    exclude: Option<ObjectId>,
) -> Option<ObjectId> {
    candidates
        .into_iter()
        .filter(|f| Some(f.id) != exclude && f.bounds.contains(center))
        .min_by(|a, b| {
            a.bounds
                .area()
                .total_cmp(&b.bounds.area())
                .then_with(|| b.z_index.cmp(&a.z_index))
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|f| f.id)
}

// =============================================================================
// GESTURE STATE
// =============================================================================

/// Starting geometry of one dragged object.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSeed {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub origin: Point,
    pub bounds: Rect,
    /// Pulled in because its parent frame is being dragged.
    pub carried: bool,
}

impl DragSeed {
    /// Whether the commit resolves a new parent for this seed.
    #[must_use]
    pub fn is_reparented(&self) -> bool {
        !self.carried && self.kind.can_be_reparented()
    }
}

/// An in-progress gesture.
#[derive(Debug, Clone)]
pub struct DragGesture {
    seeds: Vec<DragSeed>,
    dragged: HashSet<ObjectId>,
    start_world: Point,
    start_bounds: Rect,
    dx: f64,
    dy: f64,
    drop_target: Option<ObjectId>,
    last_target_check: Option<Instant>,
}

impl DragGesture {
    #[must_use]
    pub fn seeds(&self) -> &[DragSeed] {
        &self.seeds
    }

    /// Ids picked up by the user, excluding carried frame children.
    pub fn primary_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.seeds.iter().filter(|s| !s.carried).map(|s| s.id)
    }

    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.dragged.contains(id)
    }

    /// Every id that moves with the gesture, carried children included.
    #[must_use]
    pub fn dragged(&self) -> &HashSet<ObjectId> {
        &self.dragged
    }

    #[must_use]
    pub fn offset(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    #[must_use]
    pub fn drop_target(&self) -> Option<ObjectId> {
        self.drop_target
    }

    /// A lone frame (plus whatever it carries).
    #[must_use]
    pub fn single_frame(&self) -> Option<ObjectId> {
        let mut primary = self.seeds.iter().filter(|s| !s.carried);
        match (primary.next(), primary.next()) {
            (Some(seed), None) if seed.kind.is_frame() => Some(seed.id),
            _ => None,
        }
    }

    /// Frame `seed` lands in at the current offset. Dragged frames count at
    /// their moved position.
    fn landing(&self, doc: &DocStore, seed: &DragSeed) -> Option<ObjectId> {
        let center = seed.bounds.translate(self.dx, self.dy).center();
        let candidates = frames_at(doc, center, &self.dragged, self.dx, self.dy);
        smallest_containing(candidates, center, Some(seed.id))
    }

    /// The frame every re-resolved seed would land in, or `None` when they
    /// land at the root or disagree.
    fn shared_landing(&self, doc: &DocStore) -> Option<ObjectId> {
        let mut targets = self
            .seeds
            .iter()
            .filter(|s| s.is_reparented() && doc.contains(&s.id))
            .map(|s| self.landing(doc, s));
        let first = targets.next()??;
        targets.all(|t| t == Some(first)).then_some(first)
    }
}

#[derive(Debug, Clone, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragGesture),
}

/// Per-move feedback for the render layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DragFrame {
    pub dx: f64,
    pub dy: f64,
    pub guides: Vec<GuideLine>,
    pub drop_target: Option<ObjectId>,
}

/// Final writes produced by a completed gesture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragCommit {
    pub dx: f64,
    pub dy: f64,
    /// One sparse update per moved object, in seed order.
    pub updates: Vec<(ObjectId, PartialBoardObject)>,
}

impl DragCommit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Gesture state machine for single- and multi-object drags.
#[derive(Debug, Clone)]
pub struct DragEngine {
    state: DragState,
    pub mode: SnapMode,
    pub grid_size: f64,
    pub drop_target_interval: Duration,
}

impl DragEngine {
    #[must_use]
    pub fn new(mode: SnapMode, grid_size: f64, drop_target_interval: Duration) -> Self {
        Self { state: DragState::Idle, mode, grid_size, drop_target_interval }
    }

    #[must_use]
    pub fn state(&self) -> &DragState {
        &self.state
    }

    #[must_use]
    pub fn gesture(&self) -> Option<&DragGesture> {
        match &self.state {
            DragState::Dragging(g) => Some(g),
            DragState::Idle => None,
        }
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Idle → Dragging. Unknown ids are ignored; returns false when nothing is left to drag.
    pub fn begin(&mut self, doc: &DocStore, ids: &[ObjectId], start_world: Point) -> bool {
        self.state = DragState::Idle;

        let mut seeds: Vec<DragSeed> = Vec::with_capacity(ids.len());
        let mut dragged: HashSet<ObjectId> = HashSet::with_capacity(ids.len());
        for id in ids {
            let Some(obj) = doc.get(id) else { continue };
            if dragged.insert(obj.id) {
                seeds.push(DragSeed {
                    id: obj.id,
                    kind: obj.kind(),
                    origin: Point::new(obj.x, obj.y),
                    bounds: obj.bounds(),
                    carried: false,
                });
            }
        }

        let frames: Vec<ObjectId> = seeds.iter().filter(|s| s.kind.is_frame()).map(|s| s.id).collect();
        for frame_id in frames {
            for child in doc.frame_children(&frame_id) {
                if dragged.insert(child.id) {
                    seeds.push(DragSeed {
                        id: child.id,
                        kind: child.kind(),
                        origin: Point::new(child.x, child.y),
                        bounds: child.bounds(),
                        carried: true,
                    });
                }
            }
        }

        let Some(start_bounds) = seeds.iter().map(|s| s.bounds).reduce(|a, b| a.union(&b)) else {
            return false;
        };
        self.state = DragState::Dragging(DragGesture {
            seeds,
            dragged,
            start_world,
            start_bounds,
            dx: 0.0,
            dy: 0.0,
            drop_target: None,
            last_target_check: None,
        });
        true
    }

    /// Pointer moved. `visible` limits the alignment references; `tolerance` is in world units.
    ///
    /// The drop target is only recomputed once `drop_target_interval` has
    /// elapsed since the previous computation; otherwise the previous result is reused.
    pub fn update(
        &mut self,
        doc: &DocStore,
        pointer_world: Point,
        visible: &Rect,
        tolerance: f64,
        now: Instant,
    ) -> Option<DragFrame> {
        let DragState::Dragging(g) = &mut self.state else {
            return None;
        };

        let raw_dx = pointer_world.x - g.start_world.x;
        let raw_dy = pointer_world.y - g.start_world.y;
        let moving = g.start_bounds.translate(raw_dx, raw_dy);

        let references: Vec<Rect> = if self.mode == SnapMode::None {
            Vec::new()
        } else {
            doc.objects_in(visible)
                .into_iter()
                .filter(|o| !g.dragged.contains(&o.id))
                .map(|o| o.bounds())
                .collect()
        };
        let snap = snap_rect(&moving, &references, self.mode, self.grid_size, tolerance);
        g.dx = raw_dx + snap.dx;
        g.dy = raw_dy + snap.dy;

        // A target deleted or retyped since the last check is never reused.
        let stale = g.drop_target.is_some_and(|t| !doc.is_frame(&t));
        let due = stale
            || g.last_target_check
                .is_none_or(|last| now.saturating_duration_since(last) >= self.drop_target_interval);
        if due {
            g.last_target_check = Some(now);
            g.drop_target = g.shared_landing(doc);
        }

        Some(DragFrame { dx: g.dx, dy: g.dy, guides: snap.guides, drop_target: g.drop_target })
    }

    /// Dragging → Idle, producing the writes for every object that still exists.
    ///
    /// A gesture that moved less than the commit threshold produces no writes.
    pub fn end(&mut self, doc: &DocStore) -> Option<DragCommit> {
        let DragState::Dragging(g) = std::mem::take(&mut self.state) else {
            return None;
        };
        let (dx, dy) = (g.dx, g.dy);
        let mut commit = DragCommit { dx, dy, updates: Vec::new() };
        if dx.abs() <= COMMIT_EPSILON && dy.abs() <= COMMIT_EPSILON {
            return Some(commit);
        }

        for seed in &g.seeds {
            // Deleted by someone else mid-drag.
            if !doc.contains(&seed.id) {
                continue;
            }
            let mut partial = PartialBoardObject::position(seed.origin.x + dx, seed.origin.y + dy);
            if seed.is_reparented() {
                partial.parent_frame_id = Some(g.landing(doc, seed));
            }
            commit.updates.push((seed.id, partial));
        }
        Some(commit)
    }

    /// Abort without writes. Returns whether a gesture was active.
    pub fn cancel(&mut self) -> bool {
        matches!(std::mem::take(&mut self.state), DragState::Dragging(_))
    }
}
