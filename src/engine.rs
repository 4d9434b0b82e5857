//! Board session: the surface the application layer drives.
//!
//! DESIGN
//! ======
//! One [`Session`] exists per open board. It owns the document store, the
//! undo history, the drag state machine, transient render offsets, the
//! selection and the camera, and holds handles to the write-queue and
//! drag-publisher workers. Everything runs on the caller's task; the only
//! concurrency is the two workers on the far side of their channels.
//!
//! Every local mutation goes through one path: validate, apply to the
//! store (which keeps the spatial index in step), enqueue the remote write,
//! request a redraw. History-wrapped operations additionally record an
//! invertible entry, and undo/redo replay through that same path.
//!
//! Remote changesets are applied whenever they arrive, independent of any
//! gesture in progress. The last changeset applied for a field wins, with
//! one exception: a record older than a local edit the repository has not
//! yet echoed back does not undo that edit. The session keeps the stamped
//! fields of every unacknowledged local update and lays them back over
//! incoming records whose version is below the local one. A record at or
//! above the local version acknowledges (or supersedes) the edit.
//!
//! TRANSIENT STATE
//! ===============
//! Drag offsets, the drop-target highlight and alignment guides live only
//! for the duration of a gesture. Every way out of a gesture (commit,
//! cancel, selection change, undo/redo, board switch) clears them.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::camera::Camera;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::consts::HIT_SLOP_PX;
use crate::doc::{BoardObject, Change, ChangeSummary, Changeset, DocStore, ObjectId, PartialBoardObject, Shape};
use crate::drag::{self, DragCommit, DragEngine, DragFrame};
use crate::error::{ErrorCode, HistoryError, ValidationError, WriteQueueError};
use crate::geometry::{Point, Rect};
use crate::history::{Command, History, HistoryContext, HistoryEntry, ReplayReport};
use crate::hit::{self, Hit};
use crate::presence::{DragPublisher, spawn_drag_publisher};
use crate::queue::{WriteFailure, WriteQueue, spawn_write_queue};
use crate::render::{Redraw, RedrawScheduler, Scene, SceneInput, build_scene};
use crate::repository::{DragChannel, DragUpdate, ObjectRepository};
use crate::snap::{GuideLine, SnapMode};
use crate::subscribe::{SubscriptionId, Subscriptions};
use crate::transient::{DragOffsets, RemoteDrags};
use crate::validate::{validate_changeset, validate_object, validate_parent, validate_partial};

// =============================================================================
// LIVE CONTEXT
// =============================================================================

/// The single mutation path: store, write queue and redraw move together.
struct LiveContext<'a> {
    board_id: Uuid,
    doc: &'a mut DocStore,
    unacked: &'a mut HashMap<ObjectId, PartialBoardObject>,
    queue: &'a WriteQueue,
    clock: &'a dyn Clock,
    redraw: &'a mut RedrawScheduler,
}

impl LiveContext<'_> {
    fn put(&mut self, obj: BoardObject) {
        let id = obj.id;
        self.unacked.remove(&id);
        self.doc.insert(obj.clone());
        enqueued(self.queue.queue_create(obj), id);
        self.redraw.request(id);
    }

    /// Apply user fields plus a version bump. Returns false if `id` is gone.
    fn patch(&mut self, id: ObjectId, fields: &PartialBoardObject) -> bool {
        let Some(current) = self.doc.get(&id) else {
            return false;
        };
        let mut stamped = fields.clone();
        stamped.version = Some(current.version + 1);
        stamped.updated_at = Some(self.clock.now_ms());
        self.doc.apply_partial(&id, &stamped);
        self.unacked.entry(id).or_default().merge(&stamped);
        enqueued(self.queue.queue_update(self.board_id, id, stamped), id);
        self.redraw.request(id);
        true
    }

    fn take(&mut self, id: ObjectId) -> Option<BoardObject> {
        let removed = self.doc.remove(&id)?;
        self.unacked.remove(&id);
        enqueued(self.queue.queue_delete(self.board_id, id), id);
        self.redraw.request(id);
        Some(removed)
    }
}

fn enqueued(result: Result<(), WriteQueueError>, id: ObjectId) {
    if let Err(e) = result {
        warn!(%id, code = e.error_code(), error = %e, "session: write not queued");
    }
}

impl HistoryContext for LiveContext<'_> {
    /// Replayed records keep everything but a parent frame that has since gone away.
    fn create(&mut self, mut obj: BoardObject) -> Result<(), HistoryError> {
        validate_object(&obj)?;
        if validate_parent(self.doc, obj.id, Some(obj.kind()), obj.parent_frame_id).is_err() {
            debug!(id = %obj.id, "session: replayed parent frame gone; placing at root");
            obj.parent_frame_id = None;
        }
        self.put(obj);
        Ok(())
    }

    fn update(&mut self, id: ObjectId, mut fields: PartialBoardObject) -> Result<(), HistoryError> {
        validate_partial(id, &fields)?;
        let kind = self.doc.get(&id).map(BoardObject::kind);
        if validate_parent(self.doc, id, kind, fields.parent_frame_id.flatten()).is_err() {
            debug!(%id, "session: replayed parent frame gone; placing at root");
            fields.parent_frame_id = Some(None);
        }
        if self.patch(id, &fields) { Ok(()) } else { Err(HistoryError::StaleTarget(id)) }
    }

    fn delete(&mut self, id: ObjectId) -> Result<(), HistoryError> {
        self.take(id).map(|_| ()).ok_or(HistoryError::StaleTarget(id))
    }

    fn list(&self) -> Vec<ObjectId> {
        self.doc.ids().into_iter().collect()
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Sync-engine state for one open board.
pub struct Session {
    board_id: Uuid,
    user_id: Option<Uuid>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,

    doc: DocStore,
    unacked: HashMap<ObjectId, PartialBoardObject>,
    history: History,
    drag: DragEngine,
    offsets: DragOffsets,
    remote: RemoteDrags,
    guides: Vec<GuideLine>,
    selection: Vec<ObjectId>,
    camera: Camera,
    viewport_width: f64,
    viewport_height: f64,

    queue: WriteQueue,
    failures: mpsc::UnboundedReceiver<WriteFailure>,
    publisher: Option<DragPublisher>,
    redraw: RedrawScheduler,
    subscriptions: Subscriptions<Session>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("board_id", &self.board_id)
            .field("objects", &self.doc.len())
            .field("selection", &self.selection.len())
            .field("dragging", &self.drag.is_dragging())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session on `board_id` and start its write-queue worker.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(board_id: Uuid, repo: Arc<dyn ObjectRepository>, config: SyncConfig, clock: Arc<dyn Clock>) -> Self {
        let (queue, failures) = spawn_write_queue(repo, config.write_batch);
        info!(%board_id, "session opened");
        Self {
            board_id,
            user_id: None,
            config,
            clock,
            doc: DocStore::with_cell_size(config.cell_size),
            unacked: HashMap::new(),
            history: History::with_depth(config.history_depth),
            drag: DragEngine::new(SnapMode::default(), config.grid_size, config.drop_target_interval),
            offsets: DragOffsets::default(),
            remote: RemoteDrags::new(config.remote_drag_ttl),
            guides: Vec::new(),
            selection: Vec::new(),
            camera: Camera::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            queue,
            failures,
            publisher: None,
            redraw: RedrawScheduler::new(),
            subscriptions: Subscriptions::new(),
        }
    }

    /// Stamp `created_by` on new objects and ignore our own echoed drag updates.
    #[must_use]
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Publish in-progress drag positions on `channel`.
    #[must_use]
    pub fn with_drag_channel(mut self, channel: Arc<dyn DragChannel>) -> Self {
        self.publisher = Some(spawn_drag_publisher(channel, self.config.drag_publish_interval));
        self
    }

    // --- Accessors ---

    #[must_use]
    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    #[must_use]
    pub fn doc(&self) -> &DocStore {
        &self.doc
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[must_use]
    pub fn offsets(&self) -> &DragOffsets {
        &self.offsets
    }

    #[must_use]
    pub fn remote_drags(&self) -> &RemoteDrags {
        &self.remote
    }

    #[must_use]
    pub fn guides(&self) -> &[GuideLine] {
        &self.guides
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn set_snap_mode(&mut self, mode: SnapMode) {
        self.drag.mode = mode;
    }

    // =========================================================================
    // HISTORY-WRAPPED MUTATIONS
    // =========================================================================

    /// Create `obj` on this board. Audit fields are stamped here.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if the record is malformed, its id is taken, or
    /// its parent is not a frame.
    pub fn create(&mut self, mut obj: BoardObject) -> Result<ObjectId, ValidationError> {
        let now = self.clock.now_ms();
        obj.board_id = self.board_id;
        obj.created_by = obj.created_by.or(self.user_id);
        obj.created_at = now;
        obj.updated_at = now;
        obj.version = 1;
        validate_object(&obj)?;
        validate_parent(&self.doc, obj.id, Some(obj.kind()), obj.parent_frame_id)?;
        if self.doc.contains(&obj.id) {
            return Err(ValidationError::Malformed(format!("duplicate object id {}", obj.id)));
        }

        let id = obj.id;
        let mut entry = HistoryEntry::new("create");
        entry.push(Command::Create { after: obj.clone() });
        self.live().put(obj);
        self.history.push(entry);
        self.notify();
        Ok(id)
    }

    /// Create a shape on top of everything else, parented by the containment rule.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if the geometry is malformed.
    pub fn create_shape(&mut self, shape: Shape, rect: Rect) -> Result<ObjectId, ValidationError> {
        let mut obj = BoardObject::new(self.board_id, shape, rect);
        obj.z_index = self.doc.max_z().map_or(0, |z| z + 1);
        validate_object(&obj)?;
        if obj.kind().can_be_reparented() {
            obj.parent_frame_id = drag::resolve_parent_frame(&self.doc, &obj.bounds(), Some(obj.id));
        }
        self.create(obj)
    }

    /// Update one object. Returns false if it does not exist.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if the fields are malformed.
    pub fn update(&mut self, id: ObjectId, fields: PartialBoardObject) -> Result<bool, ValidationError> {
        Ok(self.update_many("update", vec![(id, fields)])? == 1)
    }

    /// Update several objects as one undoable step. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if any entry is malformed or names a parent that
    /// is not a frame; nothing is applied then.
    pub fn update_many(
        &mut self,
        label: &str,
        updates: Vec<(ObjectId, PartialBoardObject)>,
    ) -> Result<usize, ValidationError> {
        for (id, fields) in &updates {
            validate_partial(*id, fields)?;
            let kind = self.doc.get(id).map(BoardObject::kind);
            validate_parent(&self.doc, *id, kind, fields.parent_frame_id.flatten())?;
        }

        let mut entry = HistoryEntry::new(label);
        {
            let mut ctx = self.live();
            for (id, mut fields) in updates {
                fields.version = None;
                fields.updated_at = None;
                if fields.is_empty() {
                    continue;
                }
                let Some(current) = ctx.doc.get(&id) else {
                    debug!(%id, "session: update target missing");
                    continue;
                };
                let before = PartialBoardObject::capture(current, &fields);
                if ctx.patch(id, &fields) {
                    entry.push(Command::Update { id, before, after: fields });
                }
            }
        }
        let applied = entry.commands.len();
        self.history.push(entry);
        self.notify();
        Ok(applied)
    }

    /// Delete one object. Returns false if it does not exist.
    pub fn delete(&mut self, id: ObjectId) -> bool {
        self.delete_many(&[id]) > 0
    }

    /// Delete several objects as one undoable step.
    ///
    /// Children of a deleted frame are detached in the same step, so undo
    /// restores the frame and reattaches them.
    pub fn delete_many(&mut self, ids: &[ObjectId]) -> usize {
        let deleting: HashSet<ObjectId> = ids.iter().copied().filter(|id| self.doc.contains(id)).collect();
        let mut targets: Vec<ObjectId> = deleting.iter().copied().collect();
        // Non-frames first so their saved state still names their parent.
        targets.sort_by_key(|id| (self.doc.is_frame(id), *id));

        let mut entry = HistoryEntry::new("delete");
        let mut removed = 0;
        {
            let mut ctx = self.live();
            for id in targets {
                if ctx.doc.is_frame(&id) {
                    let children: Vec<ObjectId> = ctx
                        .doc
                        .frame_children(&id)
                        .iter()
                        .map(|c| c.id)
                        .filter(|c| !deleting.contains(c))
                        .collect();
                    for child in children {
                        let after = PartialBoardObject { parent_frame_id: Some(None), ..Default::default() };
                        let before = PartialBoardObject { parent_frame_id: Some(Some(id)), ..Default::default() };
                        if ctx.patch(child, &after) {
                            entry.push(Command::Update { id: child, before, after });
                        }
                    }
                }
                if let Some(before) = ctx.take(id) {
                    entry.push(Command::Delete { before });
                    removed += 1;
                }
            }
        }
        self.history.push(entry);
        self.prune_selection();
        self.notify();
        removed
    }

    /// Revert the most recent entry. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<ReplayReport> {
        self.cancel_drag();
        let (history, mut ctx) = self.split();
        let report = history.undo(&mut ctx)?;
        self.after_replay("undo", &report);
        Some(report)
    }

    /// Reapply the most recently undone entry. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<ReplayReport> {
        self.cancel_drag();
        let (history, mut ctx) = self.split();
        let report = history.redo(&mut ctx)?;
        self.after_replay("redo", &report);
        Some(report)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn after_replay(&mut self, op: &'static str, report: &ReplayReport) {
        if !report.skipped.is_empty() {
            debug!(op, applied = report.applied, skipped = report.skipped.len(), "session: partial replay");
        }
        self.prune_selection();
        self.notify();
    }

    // =========================================================================
    // SELECTION AND VIEWPORT
    // =========================================================================

    #[must_use]
    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    /// Replace the selection. Unknown ids are dropped; any gesture is cancelled.
    pub fn set_selection(&mut self, ids: &[ObjectId]) {
        self.cancel_drag();
        let mut seen = HashSet::new();
        let next: Vec<ObjectId> = ids
            .iter()
            .copied()
            .filter(|id| self.doc.contains(id) && seen.insert(*id))
            .collect();
        if next == self.selection {
            return;
        }
        self.redraw.request_many(self.selection.iter().chain(&next).copied());
        self.selection = next;
        self.notify();
    }

    /// Select everything fully inside the screen-space box from `a` to `b`.
    pub fn select_enclosed(&mut self, a: Point, b: Point) {
        let area = Rect::from_corners(self.camera.screen_to_world(a), self.camera.screen_to_world(b));
        let ids = hit::enclosed_by(&self.doc, &area);
        self.set_selection(&ids);
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width.max(0.0);
        self.viewport_height = height.max(0.0);
        self.redraw.request_full();
        self.notify();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.camera.pan_by(dx, dy);
        self.redraw.request_full();
        self.notify();
    }

    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        self.camera.zoom_at(anchor, factor);
        self.redraw.request_full();
        self.notify();
    }

    /// World-space rectangle covered by the viewport.
    #[must_use]
    pub fn visible_rect(&self) -> Rect {
        self.camera.visible_rect(self.viewport_width, self.viewport_height)
    }

    /// Ids to render, in draw order.
    #[must_use]
    pub fn visible_ids(&self) -> Vec<ObjectId> {
        self.doc.visible_ids(&self.visible_rect())
    }

    /// Descriptors for the current frame, transient offsets applied.
    #[must_use]
    pub fn scene(&self) -> Scene {
        build_scene(&SceneInput {
            doc: &self.doc,
            viewport: self.visible_rect(),
            offsets: &self.offsets,
            remote: &self.remote,
            selection: &self.selection,
            guides: &self.guides,
        })
    }

    // =========================================================================
    // DRAG LIFECYCLE
    // =========================================================================

    /// Pointer pressed at a screen position. Returns whether a drag began.
    ///
    /// Pressing inside a multi-selection's bounds, or on one of its members,
    /// drags the whole selection. Pressing on any other object selects it
    /// and drags it alone. Pressing empty canvas clears the selection.
    pub fn pointer_down(&mut self, screen: Point) -> bool {
        self.cancel_drag();
        let world = self.camera.screen_to_world(screen);
        let slop = self.camera.screen_dist_to_world(HIT_SLOP_PX);

        let ids = match hit::pick(&self.doc, world, slop, &self.selection) {
            Some(Hit::SelectionBounds) => self.selection.clone(),
            Some(Hit::Object(id)) if self.selection.contains(&id) => self.selection.clone(),
            Some(Hit::Object(id)) => {
                self.set_selection(&[id]);
                vec![id]
            }
            None => {
                self.set_selection(&[]);
                return false;
            }
        };
        let began = self.drag.begin(&self.doc, &ids, world);
        if began {
            debug!(count = ids.len(), "session: drag started");
        }
        began
    }

    /// Pointer moved. Returns the gesture feedback while a drag is active.
    pub fn pointer_move(&mut self, screen: Point) -> Option<DragFrame> {
        let world = self.camera.screen_to_world(screen);
        let visible = self.visible_rect();
        let tolerance = self.camera.screen_dist_to_world(self.config.snap_tolerance_px);
        let frame = self.drag.update(&self.doc, world, &visible, tolerance, self.clock.now())?;
        let gesture = self.drag.gesture()?;

        let previous_target = self.offsets.drop_target();
        let moved = match gesture.single_frame() {
            Some(frame_id) => self.offsets.set_frame_drag(frame_id, frame.dx, frame.dy),
            None => self.offsets.set_group_drag(gesture.dragged(), frame.dx, frame.dy),
        };
        if moved {
            self.redraw.request_many(gesture.dragged().iter().copied());
        }
        if self.offsets.set_drop_target(frame.drop_target) {
            self.redraw.request_many(previous_target.into_iter().chain(frame.drop_target));
        }
        self.guides.clone_from(&frame.guides);

        if let Some(publisher) = &self.publisher {
            for seed in gesture.seeds() {
                let update = DragUpdate {
                    board_id: self.board_id,
                    object_id: seed.id,
                    position: seed.origin.offset(frame.dx, frame.dy),
                    user_id: self.user_id,
                };
                if !publisher.publish(update) {
                    debug!("session: drag publisher stopped");
                    break;
                }
            }
        }

        self.notify();
        Some(frame)
    }

    /// Pointer released. Commits the gesture as one undoable step.
    ///
    /// Returns the commit plan, or `None` when no drag was active.
    pub fn pointer_up(&mut self, screen: Point) -> Option<DragCommit> {
        if !self.drag.is_dragging() {
            return None;
        }
        self.pointer_move(screen);
        let seeds = self.seed_ids();
        let commit = self.drag.end(&self.doc);
        self.end_gesture(&seeds);

        let commit = commit?;
        if !commit.is_empty() {
            if let Err(e) = self.update_many("move", commit.updates.clone()) {
                warn!(code = e.error_code(), error = %e, "session: drag commit rejected");
            }
        }
        debug!(dx = commit.dx, dy = commit.dy, count = commit.updates.len(), "session: drag committed");
        Some(commit)
    }

    /// Abort the active gesture without writing anything.
    pub fn cancel_drag(&mut self) -> bool {
        let seeds = self.seed_ids();
        let was_dragging = self.drag.cancel();
        self.end_gesture(&seeds);
        was_dragging
    }

    fn seed_ids(&self) -> Vec<ObjectId> {
        self.drag.gesture().map(|g| g.seeds().iter().map(|s| s.id).collect()).unwrap_or_default()
    }

    /// Clear every piece of gesture-scoped state.
    fn end_gesture(&mut self, seeds: &[ObjectId]) {
        if let Some(publisher) = &self.publisher {
            for id in seeds {
                if !publisher.end(*id) {
                    break;
                }
            }
        }
        let had_guides = !self.guides.is_empty();
        self.guides.clear();
        if self.offsets.clear() || had_guides {
            self.redraw.request_full();
            self.notify();
        }
    }

    // =========================================================================
    // REMOTE INPUT
    // =========================================================================

    /// Replace the board contents with a snapshot. Invalid records are skipped.
    pub fn load_snapshot(&mut self, objects: Vec<BoardObject>) -> usize {
        self.cancel_drag();
        let total = objects.len();
        let valid: Vec<BoardObject> = objects
            .into_iter()
            .filter(|obj| match validate_object(obj) {
                Ok(()) => true,
                Err(e) => {
                    warn!(id = %obj.id, code = e.error_code(), error = %e, "session: snapshot record rejected");
                    false
                }
            })
            .collect();
        let loaded = valid.len();
        let incoming: Vec<(ObjectId, Option<i64>)> = valid.iter().map(|o| (o.id, Some(o.version))).collect();
        self.doc.set_all(valid);
        self.reconcile_unacked(&incoming);
        self.remote.clear();
        self.prune_selection();
        self.redraw.request_full();
        self.notify();
        info!(board_id = %self.board_id, loaded, rejected = total - loaded, "session: snapshot loaded");
        loaded
    }

    /// Apply a changeset from the repository.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if any record in it is malformed; nothing is applied then.
    pub fn apply_remote_changeset(&mut self, changeset: &Changeset) -> Result<ChangeSummary, ValidationError> {
        if let Err(e) = validate_changeset(changeset) {
            warn!(board_id = %self.board_id, code = e.error_code(), error = %e, "session: remote changeset rejected");
            return Err(e);
        }
        let summary = self.doc.apply_changeset(changeset);
        let incoming: Vec<(ObjectId, Option<i64>)> = changeset
            .changes
            .iter()
            .map(|change| match change {
                Change::Created { object } | Change::Updated { object } => (object.id, Some(object.version)),
                Change::Patched { id, fields } => (*id, fields.version),
                Change::Deleted { id } => (*id, None),
            })
            .collect();
        let restored = self.reconcile_unacked(&incoming);
        self.remote.settle(summary.upserted.iter().chain(&summary.deleted));

        if self.offsets.drop_target().is_some_and(|t| !self.doc.is_frame(&t)) {
            self.offsets.set_drop_target(None);
        }
        self.redraw.request_many(
            summary
                .upserted
                .iter()
                .chain(&summary.deleted)
                .chain(&summary.detached)
                .copied(),
        );
        self.prune_selection();
        self.notify();
        debug!(
            upserted = summary.upserted.len(),
            deleted = summary.deleted.len(),
            missing = summary.missing.len(),
            restored,
            "session: remote changeset applied"
        );
        Ok(summary)
    }

    /// Record another participant's in-progress drag. Returns whether it was kept.
    pub fn apply_remote_drag(&mut self, update: &DragUpdate) -> bool {
        if update.board_id != self.board_id || !self.doc.contains(&update.object_id) {
            return false;
        }
        if self.user_id.is_some() && update.user_id == self.user_id {
            return false;
        }
        if !update.position.is_finite() {
            return false;
        }
        self.remote.apply(update, self.clock.now());
        self.redraw.request(update.object_id);
        self.notify();
        true
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Flush pending writes, then reset everything for `board_id`.
    ///
    /// History is always cleared so undo never reaches into another board.
    ///
    /// # Errors
    ///
    /// The flush result for the old board. The switch happens regardless.
    pub async fn switch_board(&mut self, board_id: Uuid) -> Result<(), WriteQueueError> {
        self.cancel_drag();
        let flushed = self.queue.flush().await;
        if let Err(e) = &flushed {
            warn!(board_id = %self.board_id, code = e.error_code(), error = %e, "session: flush before switch failed");
        }
        info!(from = %self.board_id, to = %board_id, "session: switching board");
        self.board_id = board_id;
        self.history.clear();
        self.doc.clear();
        self.unacked.clear();
        self.remote.clear();
        self.selection.clear();
        self.redraw.request_full();
        self.notify();
        flushed
    }

    /// Dispatch pending writes now and wait for the result.
    ///
    /// # Errors
    ///
    /// See [`WriteQueue::flush`].
    pub async fn flush_writes(&self) -> Result<(), WriteQueueError> {
        self.queue.flush().await
    }

    /// Write failures reported since the last call.
    pub fn take_write_failures(&mut self) -> Vec<WriteFailure> {
        let mut out = Vec::new();
        while let Ok(failure) = self.failures.try_recv() {
            out.push(failure);
        }
        out
    }

    /// Per-frame housekeeping. Returns the coalesced redraw, if any.
    pub fn tick(&mut self) -> Option<Redraw> {
        if self.remote.prune(self.clock.now()) > 0 {
            self.redraw.request_full();
            self.notify();
        }
        self.redraw.take()
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Call `callback` whenever `selector(session)` changes.
    pub fn subscribe<T, Sel, Cb>(&mut self, selector: Sel, callback: Cb) -> SubscriptionId
    where
        T: PartialEq + Send + 'static,
        Sel: Fn(&Session) -> T + Send + 'static,
        Cb: FnMut(&T) + Send + 'static,
    {
        let mut subs = std::mem::take(&mut self.subscriptions);
        let id = subs.subscribe(self, selector, callback);
        self.subscriptions = subs;
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    fn notify(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        let mut subs = std::mem::take(&mut self.subscriptions);
        subs.notify(self);
        self.subscriptions = subs;
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn live(&mut self) -> LiveContext<'_> {
        self.split().1
    }

    fn split(&mut self) -> (&mut History, LiveContext<'_>) {
        (
            &mut self.history,
            LiveContext {
                board_id: self.board_id,
                doc: &mut self.doc,
                unacked: &mut self.unacked,
                queue: &self.queue,
                clock: self.clock.as_ref(),
                redraw: &mut self.redraw,
            },
        )
    }

    /// Lay unacknowledged local edits back over records older than them.
    ///
    /// `incoming` pairs each id a remote change touched with the version it
    /// carried (`None` for deletes and unversioned patches, which always
    /// supersede). Returns how many objects had local edits restored.
    fn reconcile_unacked(&mut self, incoming: &[(ObjectId, Option<i64>)]) -> usize {
        let mut restored = 0;
        for (id, version) in incoming {
            let Some(local) = self.unacked.get(id) else {
                continue;
            };
            let local_version = local.version.unwrap_or(0);
            let older = version.is_some_and(|v| v < local_version);
            if older && self.doc.apply_partial(id, local) {
                restored += 1;
            } else {
                self.unacked.remove(id);
            }
        }
        restored
    }

    fn prune_selection(&mut self) {
        let doc = &self.doc;
        self.selection.retain(|id| doc.contains(id));
    }
}
