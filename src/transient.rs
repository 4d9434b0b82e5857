//! Render-only state that changes every pointer frame.
//!
//! Nothing here is persisted or written to the store. [`DragOffsets`] holds
//! the local gesture's offsets so only affected shapes redraw while dragging;
//! [`RemoteDrags`] holds other participants' in-progress positions until a
//! durable changeset lands or the entry goes stale.

#[cfg(test)]
#[path = "transient_test.rs"]
mod transient_test;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::doc::{BoardObject, ObjectId};
use crate::geometry::Point;
use crate::repository::DragUpdate;

// =============================================================================
// LOCAL DRAG OFFSETS
// =============================================================================

/// Offset applied to a dragged frame and the children riding on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDragOffset {
    pub frame_id: ObjectId,
    pub dx: f64,
    pub dy: f64,
}

/// Offset shared by every member of a dragged selection.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDragOffset {
    pub members: HashSet<ObjectId>,
    pub dx: f64,
    pub dy: f64,
}

/// Transient offsets for the local gesture. Cleared on every gesture exit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragOffsets {
    frame_drag: Option<FrameDragOffset>,
    drop_target: Option<ObjectId>,
    group_drag: Option<GroupDragOffset>,
    generation: u64,
}

impl DragOffsets {
    #[must_use]
    pub fn frame_drag(&self) -> Option<FrameDragOffset> {
        self.frame_drag
    }

    #[must_use]
    pub fn drop_target(&self) -> Option<ObjectId> {
        self.drop_target
    }

    #[must_use]
    pub fn group_drag(&self) -> Option<&GroupDragOffset> {
        self.group_drag.as_ref()
    }

    /// Bumped on every visible change; render subscribers key off it.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.frame_drag.is_some() || self.group_drag.is_some() || self.drop_target.is_some()
    }

    /// Returns whether anything changed.
    pub fn set_frame_drag(&mut self, frame_id: ObjectId, dx: f64, dy: f64) -> bool {
        let next = Some(FrameDragOffset { frame_id, dx, dy });
        if self.frame_drag == next {
            return false;
        }
        self.frame_drag = next;
        self.generation += 1;
        true
    }

    /// Returns whether anything changed.
    pub fn set_group_drag(&mut self, members: &HashSet<ObjectId>, dx: f64, dy: f64) -> bool {
        let unchanged = self
            .group_drag
            .as_ref()
            .is_some_and(|g| g.dx.to_bits() == dx.to_bits() && g.dy.to_bits() == dy.to_bits() && g.members == *members);
        if unchanged {
            return false;
        }
        self.group_drag = Some(GroupDragOffset { members: members.clone(), dx, dy });
        self.generation += 1;
        true
    }

    /// Returns whether anything changed.
    pub fn set_drop_target(&mut self, target: Option<ObjectId>) -> bool {
        if self.drop_target == target {
            return false;
        }
        self.drop_target = target;
        self.generation += 1;
        true
    }

    /// Drop every offset. Returns whether anything was set.
    pub fn clear(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.frame_drag = None;
        self.drop_target = None;
        self.group_drag = None;
        self.generation += 1;
        true
    }

    /// Render offset for `obj`, if the local gesture is moving it.
    #[must_use]
    pub fn offset_for(&self, obj: &BoardObject) -> Option<(f64, f64)> {
        if let Some(f) = self.frame_drag {
            if obj.id == f.frame_id || obj.parent_frame_id == Some(f.frame_id) {
                return Some((f.dx, f.dy));
            }
        }
        match &self.group_drag {
            Some(g) if g.members.contains(&obj.id) => Some((g.dx, g.dy)),
            _ => None,
        }
    }
}

// =============================================================================
// REMOTE DRAG PREVIEWS
// =============================================================================

/// Another participant's uncommitted drag position for one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteDrag {
    pub position: Point,
    pub user_id: Option<uuid::Uuid>,
    pub received_at: Instant,
}

/// Remote in-progress drags keyed by object, expiring after `ttl`.
#[derive(Debug, Clone)]
pub struct RemoteDrags {
    entries: HashMap<ObjectId, RemoteDrag>,
    ttl: Duration,
}

impl RemoteDrags {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    /// Record a realtime update, replacing any earlier one for the object.
    pub fn apply(&mut self, update: &DragUpdate, now: Instant) {
        self.entries.insert(
            update.object_id,
            RemoteDrag { position: update.position, user_id: update.user_id, received_at: now },
        );
    }

    /// Drop entries older than the TTL. Returns how many went away.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, d| now.saturating_duration_since(d.received_at) < ttl);
        before - self.entries.len()
    }

    /// Forget previews for objects a durable changeset just touched.
    pub fn settle<'a>(&mut self, ids: impl IntoIterator<Item = &'a ObjectId>) -> usize {
        let before = self.entries.len();
        for id in ids {
            self.entries.remove(id);
        }
        before - self.entries.len()
    }

    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&RemoteDrag> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &RemoteDrag)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
