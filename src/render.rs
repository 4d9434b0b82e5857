//! Rendering collaborator surface: redraw scheduling and scene descriptors.
//!
//! The engine never draws. It produces a [`Scene`] of abstract shape
//! descriptors for whatever surface the host uses, and a
//! [`RedrawScheduler`] that turns many mutations into one redraw request
//! per tick.
//!
//! Layering follows paint order: shapes bottom to top by `(z_index, id)`,
//! then selection chrome, then alignment guides.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::collections::HashSet;

use crate::doc::{BoardObject, DocStore, ObjectId, ObjectKind, Style};
use crate::geometry::{Point, Rect};
use crate::hit;
use crate::snap::GuideLine;
use crate::transient::{DragOffsets, RemoteDrags};

// =============================================================================
// REDRAW SCHEDULING
// =============================================================================

/// One coalesced redraw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redraw {
    /// Everything must repaint (snapshot load, board switch, camera move).
    pub full: bool,
    /// Objects known to have changed. Empty when `full`.
    pub ids: Vec<ObjectId>,
}

/// Collects redraw requests between ticks.
#[derive(Debug, Clone, Default)]
pub struct RedrawScheduler {
    pending: bool,
    full: bool,
    dirty: HashSet<ObjectId>,
    ticks: u64,
}

impl RedrawScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, id: ObjectId) {
        self.pending = true;
        if !self.full {
            self.dirty.insert(id);
        }
    }

    pub fn request_many(&mut self, ids: impl IntoIterator<Item = ObjectId>) {
        for id in ids {
            self.request(id);
        }
    }

    pub fn request_full(&mut self) {
        self.pending = true;
        self.full = true;
        self.dirty.clear();
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Take the pending redraw for this tick, if any.
    pub fn take(&mut self) -> Option<Redraw> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        self.ticks += 1;
        let full = std::mem::take(&mut self.full);
        let mut ids: Vec<ObjectId> = self.dirty.drain().collect();
        ids.sort_unstable();
        Some(Redraw { full, ids })
    }

    /// Redraws handed out so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

// =============================================================================
// SCENE
// =============================================================================

/// Why a shape is drawn somewhere other than its stored position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Stored,
    /// Moved by the local gesture.
    LocalDrag,
    /// Moved by another participant's uncommitted drag.
    RemoteDrag,
}

/// Everything a surface needs to paint one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDescriptor {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Layout rectangle at its displayed position.
    pub rect: Rect,
    pub rotation: f64,
    pub z_index: i64,
    pub style: Style,
    pub text: Option<String>,
    /// Path points relative to `rect`'s origin.
    pub points: Option<Vec<Point>>,
    pub motion: Motion,
    pub selected: bool,
    /// Highlighted as the frame a drop would land in.
    pub drop_target: bool,
}

/// A frame's worth of descriptors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub shapes: Vec<ShapeDescriptor>,
    /// Selection bounds at displayed position, when anything is selected.
    pub selection_bounds: Option<Rect>,
    pub guides: Vec<GuideLine>,
}

/// Read-only inputs for [`build_scene`].
#[derive(Debug, Clone, Copy)]
pub struct SceneInput<'a> {
    pub doc: &'a DocStore,
    pub viewport: Rect,
    pub offsets: &'a DragOffsets,
    pub remote: &'a RemoteDrags,
    pub selection: &'a [ObjectId],
    pub guides: &'a [GuideLine],
}

/// Build descriptors for everything visible in `input.viewport`.
///
/// Local drag offsets take precedence over remote previews for the same object.
#[must_use]
pub fn build_scene(input: &SceneInput<'_>) -> Scene {
    let doc = input.doc;
    let mut ids: HashSet<ObjectId> = doc.candidates(&query_area(input));
    ids.extend(input.remote.iter().map(|(id, _)| *id));

    let selected: HashSet<ObjectId> = input.selection.iter().copied().collect();
    let drop_target = input.offsets.drop_target();

    let mut objects: Vec<&BoardObject> = ids.iter().filter_map(|id| doc.get(id)).collect();
    objects.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));

    let shapes: Vec<ShapeDescriptor> = objects
        .into_iter()
        .filter_map(|obj| {
            let shape = describe(obj, input, selected.contains(&obj.id), drop_target == Some(obj.id));
            let shown = obj.bounds().translate(shape.rect.x - obj.x, shape.rect.y - obj.y);
            shown.intersects(&input.viewport).then_some(shape)
        })
        .collect();

    let selection_bounds = hit::selection_bounds(doc, input.selection).map(|b| match selection_offset(input) {
        Some((dx, dy)) => b.translate(dx, dy),
        None => b,
    });

    Scene { shapes, selection_bounds, guides: input.guides.to_vec() }
}

/// Viewport widened so objects whose stored position is off-screen but
/// whose dragged position is on-screen are still found.
fn query_area(input: &SceneInput<'_>) -> Rect {
    let mut area = input.viewport;
    if let Some(f) = input.offsets.frame_drag() {
        area = area.union(&input.viewport.translate(-f.dx, -f.dy));
    }
    if let Some(g) = input.offsets.group_drag() {
        area = area.union(&input.viewport.translate(-g.dx, -g.dy));
    }
    area
}

fn describe(obj: &BoardObject, input: &SceneInput<'_>, selected: bool, drop_target: bool) -> ShapeDescriptor {
    let (rect, motion) = if let Some((dx, dy)) = input.offsets.offset_for(obj) {
        (obj.rect().translate(dx, dy), Motion::LocalDrag)
    } else if let Some(remote) = input.remote.get(&obj.id) {
        (Rect::new(remote.position.x, remote.position.y, obj.width, obj.height), Motion::RemoteDrag)
    } else {
        (obj.rect(), Motion::Stored)
    };
    ShapeDescriptor {
        id: obj.id,
        kind: obj.kind(),
        rect,
        rotation: obj.rotation,
        z_index: obj.z_index,
        style: obj.style.clone(),
        text: obj.shape.text().map(str::to_string),
        points: obj.shape.points().map(<[Point]>::to_vec),
        motion,
        selected,
        drop_target,
    }
}

/// Offset shared by the whole selection while it is being dragged.
fn selection_offset(input: &SceneInput<'_>) -> Option<(f64, f64)> {
    let first = input.selection.first().and_then(|id| input.doc.get(id))?;
    input.offsets.offset_for(first)
}
