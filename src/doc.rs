//! Document model: board objects, sparse updates, changesets and the store.
//!
//! This module defines what lives on the canvas (`BoardObject`, a common
//! geometry/audit header around a per-kind `Shape` payload), a field-level
//! sparse update (`PartialBoardObject`), the atomic batch type used for
//! snapshots and remote deltas (`Changeset`), and the runtime store that
//! owns all live objects together with their spatial index (`DocStore`).
//!
//! Records reach this layer already validated (see [`crate::validate`]).
//! Every mutation in `DocStore` goes through `put`/`take`, the only two
//! places that touch both the object map and the index.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::geometry::{Point, Rect};
use crate::spatial::SpatialIndex;

/// Unique identifier for a board object.
pub type ObjectId = Uuid;

// =============================================================================
// KINDS AND SHAPES
// =============================================================================

/// Discriminant of a board object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    StickyNote,
    Rect,
    Ellipse,
    Diamond,
    Text,
    Frame,
    Connector,
    Freehand,
}

impl ObjectKind {
    #[must_use]
    pub fn is_frame(self) -> bool {
        self == Self::Frame
    }

    #[must_use]
    pub fn is_connector(self) -> bool {
        self == Self::Connector
    }

    /// Whether geometry comes from a point list.
    #[must_use]
    pub fn is_path(self) -> bool {
        matches!(self, Self::Connector | Self::Freehand)
    }

    /// Frames and connectors never get a parent frame.
    #[must_use]
    pub fn can_be_reparented(self) -> bool {
        !matches!(self, Self::Frame | Self::Connector)
    }
}

/// Per-kind payload. Only the fields that make sense for a kind exist on it.
///
/// Path points are stored relative to the object's `(x, y)` origin, so
/// moving an object never rewrites its points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    StickyNote {
        #[serde(default)]
        text: String,
    },
    Rect {
        #[serde(default)]
        text: String,
    },
    Ellipse {
        #[serde(default)]
        text: String,
    },
    Diamond {
        #[serde(default)]
        text: String,
    },
    Text {
        #[serde(default)]
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f64,
    },
    Frame {
        #[serde(default)]
        title: String,
    },
    Connector {
        points: Vec<Point>,
        #[serde(default)]
        start_id: Option<ObjectId>,
        #[serde(default)]
        end_id: Option<ObjectId>,
    },
    Freehand {
        points: Vec<Point>,
    },
}

fn default_font_size() -> f64 {
    16.0
}

impl Shape {
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::StickyNote { .. } => ObjectKind::StickyNote,
            Self::Rect { .. } => ObjectKind::Rect,
            Self::Ellipse { .. } => ObjectKind::Ellipse,
            Self::Diamond { .. } => ObjectKind::Diamond,
            Self::Text { .. } => ObjectKind::Text,
            Self::Frame { .. } => ObjectKind::Frame,
            Self::Connector { .. } => ObjectKind::Connector,
            Self::Freehand { .. } => ObjectKind::Freehand,
        }
    }

    /// Label text, or the frame title. `None` for path shapes.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::StickyNote { text }
            | Self::Rect { text }
            | Self::Ellipse { text }
            | Self::Diamond { text }
            | Self::Text { text, .. } => Some(text),
            Self::Frame { title } => Some(title),
            Self::Connector { .. } | Self::Freehand { .. } => None,
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::StickyNote { text }
            | Self::Rect { text }
            | Self::Ellipse { text }
            | Self::Diamond { text }
            | Self::Text { text, .. } => Some(text),
            Self::Frame { title } => Some(title),
            Self::Connector { .. } | Self::Freehand { .. } => None,
        }
    }

    #[must_use]
    pub fn points(&self) -> Option<&[Point]> {
        match self {
            Self::Connector { points, .. } | Self::Freehand { points } => Some(points),
            _ => None,
        }
    }

    fn points_mut(&mut self) -> Option<&mut Vec<Point>> {
        match self {
            Self::Connector { points, .. } | Self::Freehand { points } => Some(points),
            _ => None,
        }
    }
}

/// Visual attributes shared by every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self { fill: "#D94B4B".into(), stroke: "#1F1A17".into(), stroke_width: 1.0, opacity: 1.0 }
    }
}

// =============================================================================
// BOARD OBJECT
// =============================================================================

/// A board object as stored in the document and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardObject {
    /// Unique identifier for this object.
    pub id: ObjectId,
    /// The board this object belongs to.
    pub board_id: Uuid,
    /// Kind-specific payload; serialized inline with a `kind` tag.
    #[serde(flatten)]
    pub shape: Shape,
    /// Left edge in world coordinates.
    pub x: f64,
    /// Top edge in world coordinates.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in degrees around the center.
    #[serde(default)]
    pub rotation: f64,
    /// Stacking order; lower values are drawn beneath higher values.
    #[serde(default)]
    pub z_index: i64,
    #[serde(default)]
    pub style: Style,
    /// Containing frame. A back-reference, not ownership.
    #[serde(default)]
    pub parent_frame_id: Option<ObjectId>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub updated_at: i64,
    /// Monotonically increasing edit counter.
    #[serde(default)]
    pub version: i64,
}

impl BoardObject {
    /// New object with a fresh id, default style and version 1.
    #[must_use]
    pub fn new(board_id: Uuid, shape: Shape, rect: Rect) -> Self {
        Self {
            id: Uuid::new_v4(),
            board_id,
            shape,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            rotation: 0.0,
            z_index: 0,
            style: Style::default(),
            parent_frame_id: None,
            created_by: None,
            created_at: 0,
            updated_at: 0,
            version: 1,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.shape.kind()
    }

    /// The unrotated layout rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Axis-aligned box enclosing the drawable extent, rotation included.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let base = match self.shape.points().and_then(Rect::from_points) {
            Some(local) => local.translate(self.x, self.y),
            None => self.rect(),
        };
        rotated_bounds(base, self.rotation)
    }

    /// Apply a sparse update. Fields that do not exist on this kind are ignored.
    ///
    /// Returns `true` when the bounding box may have changed.
    pub fn apply(&mut self, partial: &PartialBoardObject) -> bool {
        let mut geometry = false;
        if let Some(x) = partial.x {
            self.x = x;
            geometry = true;
        }
        if let Some(y) = partial.y {
            self.y = y;
            geometry = true;
        }
        if let Some(w) = partial.width {
            self.width = w;
            geometry = true;
        }
        if let Some(h) = partial.height {
            self.height = h;
            geometry = true;
        }
        if let Some(r) = partial.rotation {
            self.rotation = r;
            geometry = true;
        }
        if let Some(z) = partial.z_index {
            self.z_index = z;
        }
        if let Some(ref fill) = partial.fill {
            self.style.fill.clone_from(fill);
        }
        if let Some(ref stroke) = partial.stroke {
            self.style.stroke.clone_from(stroke);
        }
        if let Some(sw) = partial.stroke_width {
            self.style.stroke_width = sw;
        }
        if let Some(o) = partial.opacity {
            self.style.opacity = o;
        }
        if let Some(ref text) = partial.text {
            if let Some(slot) = self.shape.text_mut() {
                slot.clone_from(text);
            }
        }
        if let Some(ref points) = partial.points {
            if let Some(slot) = self.shape.points_mut() {
                slot.clone_from(points);
                geometry = true;
            }
        }
        if let Some(parent) = partial.parent_frame_id {
            self.parent_frame_id = parent;
        }
        if let Some(ts) = partial.updated_at {
            self.updated_at = ts;
        }
        if let Some(v) = partial.version {
            self.version = v;
        }
        geometry
    }
}

fn rotated_bounds(base: Rect, rotation_deg: f64) -> Rect {
    if rotation_deg.rem_euclid(360.0).abs() < f64::EPSILON {
        return base;
    }
    let c = base.center();
    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    let corners = [
        Point::new(base.x, base.y),
        Point::new(base.right(), base.y),
        Point::new(base.right(), base.bottom()),
        Point::new(base.x, base.bottom()),
    ]
    .map(|p| {
        let dx = p.x - c.x;
        let dy = p.y - c.y;
        Point::new(c.x + dx * cos - dy * sin, c.y + dx * sin + dy * cos)
    });
    Rect::from_points(&corners).unwrap_or(base)
}

// =============================================================================
// PARTIAL UPDATE
// =============================================================================

/// Sparse update for a board object. Only present fields are applied.
///
/// `parent_frame_id` is doubly optional: `None` leaves the parent alone,
/// `Some(None)` clears it, `Some(Some(id))` sets it. On the wire, an absent
/// key means "leave alone" and `null` means "clear".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBoardObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Label text, or the title for frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub parent_frame_id: Option<Option<ObjectId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

impl PartialBoardObject {
    /// Position-only update.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Default::default() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a newer update into this one; fields present in `newer` win.
    pub fn merge(&mut self, newer: &PartialBoardObject) {
        fn take<T: Clone>(slot: &mut Option<T>, newer: &Option<T>) {
            if newer.is_some() {
                slot.clone_from(newer);
            }
        }
        take(&mut self.x, &newer.x);
        take(&mut self.y, &newer.y);
        take(&mut self.width, &newer.width);
        take(&mut self.height, &newer.height);
        take(&mut self.rotation, &newer.rotation);
        take(&mut self.z_index, &newer.z_index);
        take(&mut self.fill, &newer.fill);
        take(&mut self.stroke, &newer.stroke);
        take(&mut self.stroke_width, &newer.stroke_width);
        take(&mut self.opacity, &newer.opacity);
        take(&mut self.text, &newer.text);
        take(&mut self.points, &newer.points);
        take(&mut self.parent_frame_id, &newer.parent_frame_id);
        take(&mut self.updated_at, &newer.updated_at);
        take(&mut self.version, &newer.version);
    }

    /// Snapshot `obj`'s current values for exactly the fields `fields` touches.
    ///
    /// Applying the result to the post-update object restores those fields.
    #[must_use]
    pub fn capture(obj: &BoardObject, fields: &PartialBoardObject) -> Self {
        fn pick<T: Clone>(present: bool, value: T) -> Option<T> {
            present.then_some(value)
        }
        Self {
            x: pick(fields.x.is_some(), obj.x),
            y: pick(fields.y.is_some(), obj.y),
            width: pick(fields.width.is_some(), obj.width),
            height: pick(fields.height.is_some(), obj.height),
            rotation: pick(fields.rotation.is_some(), obj.rotation),
            z_index: pick(fields.z_index.is_some(), obj.z_index),
            fill: pick(fields.fill.is_some(), obj.style.fill.clone()),
            stroke: pick(fields.stroke.is_some(), obj.style.stroke.clone()),
            stroke_width: pick(fields.stroke_width.is_some(), obj.style.stroke_width),
            opacity: pick(fields.opacity.is_some(), obj.style.opacity),
            text: fields.text.as_ref().and(obj.shape.text().map(str::to_string)),
            points: fields.points.as_ref().and(obj.shape.points().map(<[Point]>::to_vec)),
            parent_frame_id: pick(fields.parent_frame_id.is_some(), obj.parent_frame_id),
            updated_at: None,
            version: None,
        }
    }
}

// =============================================================================
// CHANGESET
// =============================================================================

/// One entry in a changeset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    /// Full record; inserted or replaced.
    Created { object: BoardObject },
    /// Full record; inserted or replaced.
    Updated { object: BoardObject },
    /// Field-level update to an existing record. Skipped if the record is gone.
    Patched { id: ObjectId, fields: PartialBoardObject },
    /// Removal. Deleting a missing id is a no-op.
    Deleted { id: ObjectId },
}

impl Change {
    #[must_use]
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Created { object } | Self::Updated { object } => object.id,
            Self::Patched { id, .. } | Self::Deleted { id } => *id,
        }
    }
}

/// Ordered batch of changes applied as one unit.
///
/// Application is idempotent: every entry sets absolute state, so
/// replaying a changeset delivered twice leaves the store unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    pub changes: Vec<Change>,
}

impl Changeset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn created(mut self, object: BoardObject) -> Self {
        self.changes.push(Change::Created { object });
        self
    }

    #[must_use]
    pub fn updated(mut self, object: BoardObject) -> Self {
        self.changes.push(Change::Updated { object });
        self
    }

    #[must_use]
    pub fn patched(mut self, id: ObjectId, fields: PartialBoardObject) -> Self {
        self.changes.push(Change::Patched { id, fields });
        self
    }

    #[must_use]
    pub fn deleted(mut self, id: ObjectId) -> Self {
        self.changes.push(Change::Deleted { id });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Ids touched by this changeset, in first-seen order.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut seen = HashSet::new();
        self.changes
            .iter()
            .map(Change::id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// What a changeset actually did to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Ids inserted or replaced.
    pub upserted: Vec<ObjectId>,
    /// Ids removed.
    pub deleted: Vec<ObjectId>,
    /// Patches whose target did not exist.
    pub missing: Vec<ObjectId>,
    /// Objects whose `parent_frame_id` was cleared because the frame went away.
    pub detached: Vec<ObjectId>,
}

// =============================================================================
// DOC STORE
// =============================================================================

/// In-memory store of board objects plus their derived spatial index.
#[derive(Debug, Clone)]
pub struct DocStore {
    objects: HashMap<ObjectId, BoardObject>,
    index: SpatialIndex,
    revision: u64,
}

impl Default for DocStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocStore {
    /// Create an empty store with the default cell size.
    #[must_use]
    pub fn new() -> Self {
        Self { objects: HashMap::new(), index: SpatialIndex::default(), revision: 0 }
    }

    /// Create an empty store whose index uses `cell_size`.
    #[must_use]
    pub fn with_cell_size(cell_size: f64) -> Self {
        Self { objects: HashMap::new(), index: SpatialIndex::new(cell_size), revision: 0 }
    }

    // --- Mutations ---

    /// Replace all contents with a snapshot and rebuild the index from scratch.
    pub fn set_all(&mut self, objects: Vec<BoardObject>) -> Vec<ObjectId> {
        self.objects.clear();
        self.index.clear();
        for obj in objects {
            self.put(obj);
        }
        self.revision += 1;
        self.detach_all_orphans()
    }

    /// Apply every change in order. Never leaves map and index out of step.
    pub fn apply_changeset(&mut self, changeset: &Changeset) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        let mut frames_touched = false;
        let mut touched = Vec::with_capacity(changeset.len());

        for change in &changeset.changes {
            match change {
                Change::Created { object } | Change::Updated { object } => {
                    let previous = self.put(object.clone());
                    frames_touched |= object.kind().is_frame() || previous.is_some_and(|p| p.kind().is_frame());
                    summary.upserted.push(object.id);
                    touched.push(object.id);
                }
                Change::Patched { id, fields } => {
                    if self.patch(id, fields) {
                        summary.upserted.push(*id);
                        touched.push(*id);
                    } else {
                        summary.missing.push(*id);
                    }
                }
                Change::Deleted { id } => {
                    if let Some(prev) = self.take(id) {
                        frames_touched |= prev.kind().is_frame();
                        summary.deleted.push(*id);
                    }
                }
            }
        }

        if !changeset.is_empty() {
            self.revision += 1;
        }
        summary.detached = if frames_touched { self.detach_all_orphans() } else { self.detach_orphans_in(&touched) };
        summary
    }

    /// Insert or replace one object.
    pub fn insert(&mut self, obj: BoardObject) -> Option<BoardObject> {
        let is_frame = obj.kind().is_frame();
        let id = obj.id;
        let previous = self.put(obj);
        self.revision += 1;
        if is_frame || previous.as_ref().is_some_and(|p| p.kind().is_frame()) {
            self.detach_all_orphans();
        } else {
            self.detach_orphans_in(&[id]);
        }
        previous
    }

    /// Remove an object by id, returning it if it was present.
    pub fn remove(&mut self, id: &ObjectId) -> Option<BoardObject> {
        let removed = self.take(id)?;
        self.revision += 1;
        if removed.kind().is_frame() {
            self.detach_all_orphans();
        }
        Some(removed)
    }

    /// Apply a sparse update to an existing object. Returns false if it doesn't exist.
    pub fn apply_partial(&mut self, id: &ObjectId, partial: &PartialBoardObject) -> bool {
        if !self.patch(id, partial) {
            return false;
        }
        self.revision += 1;
        self.detach_orphans_in(&[*id]);
        true
    }

    /// Drop everything (board switch).
    pub fn clear(&mut self) {
        self.objects.clear();
        self.index.clear();
        self.revision += 1;
    }

    // --- Single code path for map + index ---

    fn put(&mut self, obj: BoardObject) -> Option<BoardObject> {
        self.index.insert(obj.id, obj.bounds());
        self.objects.insert(obj.id, obj)
    }

    fn take(&mut self, id: &ObjectId) -> Option<BoardObject> {
        self.index.remove(id);
        self.objects.remove(id)
    }

    fn patch(&mut self, id: &ObjectId, partial: &PartialBoardObject) -> bool {
        let Some(obj) = self.objects.get_mut(id) else {
            return false;
        };
        if obj.apply(partial) {
            self.index.update(*id, obj.bounds());
        }
        true
    }

    /// Clear parent references that no longer point at a live frame.
    fn detach_all_orphans(&mut self) -> Vec<ObjectId> {
        let ids: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| o.parent_frame_id.is_some())
            .map(|o| o.id)
            .collect();
        self.detach_orphans_in(&ids)
    }

    fn detach_orphans_in(&mut self, ids: &[ObjectId]) -> Vec<ObjectId> {
        let orphans: Vec<ObjectId> = ids
            .iter()
            .filter(|id| {
                let Some(obj) = self.objects.get(*id) else {
                    return false;
                };
                match obj.parent_frame_id {
                    Some(parent) => parent == obj.id || !self.is_frame(&parent),
                    None => false,
                }
            })
            .copied()
            .collect();
        for id in &orphans {
            if let Some(obj) = self.objects.get_mut(id) {
                obj.parent_frame_id = None;
            }
        }
        orphans
    }

    // --- Selectors ---

    /// Return a reference to an object by id.
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&BoardObject> {
        self.objects.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    #[must_use]
    pub fn is_frame(&self, id: &ObjectId) -> bool {
        self.objects.get(id).is_some_and(|o| o.kind().is_frame())
    }

    /// Iterate all live objects in no particular order.
    pub fn objects(&self) -> impl Iterator<Item = &BoardObject> {
        self.objects.values()
    }

    /// All live ids in no particular order.
    #[must_use]
    pub fn ids(&self) -> HashSet<ObjectId> {
        self.objects.keys().copied().collect()
    }

    /// Objects whose `parent_frame_id` is `frame_id`, in draw order.
    #[must_use]
    pub fn frame_children(&self, frame_id: &ObjectId) -> Vec<&BoardObject> {
        let mut out: Vec<&BoardObject> = self
            .objects
            .values()
            .filter(|o| o.parent_frame_id.as_ref() == Some(frame_id))
            .collect();
        sort_draw_order(&mut out);
        out
    }

    /// Every frame, in draw order.
    #[must_use]
    pub fn frames(&self) -> Vec<&BoardObject> {
        let mut out: Vec<&BoardObject> = self.objects.values().filter(|o| o.kind().is_frame()).collect();
        sort_draw_order(&mut out);
        out
    }

    /// Index candidates overlapping `area`. Cell-level precision only.
    #[must_use]
    pub fn candidates(&self, area: &Rect) -> HashSet<ObjectId> {
        self.index.query(area)
    }

    /// Objects whose bounds intersect `area`, in draw order.
    #[must_use]
    pub fn objects_in(&self, area: &Rect) -> Vec<&BoardObject> {
        let mut out: Vec<&BoardObject> = self
            .index
            .query(area)
            .iter()
            .filter_map(|id| self.objects.get(id))
            .filter(|o| o.bounds().intersects(area))
            .collect();
        sort_draw_order(&mut out);
        out
    }

    /// Ids to render for a viewport, in draw order.
    #[must_use]
    pub fn visible_ids(&self, viewport: &Rect) -> Vec<ObjectId> {
        self.objects_in(viewport).into_iter().map(|o| o.id).collect()
    }

    /// All objects sorted by `(z_index, id)` for draw order.
    #[must_use]
    pub fn sorted_objects(&self) -> Vec<&BoardObject> {
        let mut objs: Vec<&BoardObject> = self.objects.values().collect();
        sort_draw_order(&mut objs);
        objs
    }

    /// Highest `z_index` in use, or `None` when empty.
    #[must_use]
    pub fn max_z(&self) -> Option<i64> {
        self.objects.values().map(|o| o.z_index).max()
    }

    /// Bumped on every mutation; subscribers compare against it.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Read-only view of the derived index.
    #[must_use]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Number of objects currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the store contains no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn sort_draw_order(objs: &mut [&BoardObject]) {
    objs.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
}
