//! Remote collaborators: the durable object repository and the ephemeral
//! drag-position channel.
//!
//! DESIGN
//! ======
//! The engine only ever talks to [`ObjectRepository`] and [`DragChannel`].
//! Both are async traits so a real backend (Postgres, a hosted realtime
//! store, a websocket relay) can sit behind them, and tests can swap in
//! [`MemoryRepository`].
//!
//! Durable changes come back as [`Delta`]s: a changeset tagged with the
//! repository's sequence number. A client that remembers the last sequence
//! it applied can resume with `subscribe_to_delta_updates(board, since)` and
//! receive exactly what it missed. Delivery is at-least-once; consumers
//! apply changesets idempotently.
//!
//! `MemoryRepository` keeps all state behind one mutex that is never held
//! across an await point.

#[cfg(test)]
#[path = "repository_test.rs"]
mod repository_test;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::doc::{BoardObject, Change, Changeset, ObjectId, PartialBoardObject};
use crate::error::RepositoryError;
use crate::geometry::Point;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// A changeset stamped with the repository's monotonically increasing sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub seq: u64,
    pub changeset: Changeset,
}

/// One page of a board snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub objects: Vec<BoardObject>,
    /// Pass back to fetch the next page. `None` on the last page.
    pub next_cursor: Option<u64>,
    /// Repository sequence at the moment the page was read.
    pub seq: u64,
}

/// In-progress position of an object someone is dragging. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragUpdate {
    pub board_id: Uuid,
    pub object_id: ObjectId,
    pub position: Point,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

// =============================================================================
// TRAITS
// =============================================================================

/// Durable object storage. Writes resolve once the backend has accepted them.
#[async_trait::async_trait]
pub trait ObjectRepository: Send + Sync {
    /// # Errors
    ///
    /// Network or permission failures from the backend.
    async fn create_object(&self, object: &BoardObject) -> Result<(), RepositoryError>;

    /// # Errors
    ///
    /// Network or permission failures. The batch is all-or-nothing.
    async fn create_objects_batch(&self, objects: &[BoardObject]) -> Result<(), RepositoryError>;

    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when the object does not exist, plus
    /// network or permission failures.
    async fn update_object(
        &self,
        board_id: Uuid,
        id: ObjectId,
        fields: &PartialBoardObject,
    ) -> Result<(), RepositoryError>;

    /// # Errors
    ///
    /// As [`ObjectRepository::update_object`]. The batch is all-or-nothing.
    async fn update_objects_batch(
        &self,
        board_id: Uuid,
        updates: &[(ObjectId, PartialBoardObject)],
    ) -> Result<(), RepositoryError>;

    /// Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Network or permission failures.
    async fn delete_object(&self, board_id: Uuid, id: ObjectId) -> Result<(), RepositoryError>;

    /// # Errors
    ///
    /// Network or permission failures.
    async fn delete_objects_batch(&self, board_id: Uuid, ids: &[ObjectId]) -> Result<(), RepositoryError>;

    /// Live changesets for `board_id` from now on.
    ///
    /// # Errors
    ///
    /// Network or permission failures while subscribing.
    async fn subscribe_to_objects(&self, board_id: Uuid) -> Result<mpsc::UnboundedReceiver<Changeset>, RepositoryError>;

    /// Snapshot page ordered by `(z_index, id)`. `cursor` is `None` for the first page.
    ///
    /// # Errors
    ///
    /// Network or permission failures.
    async fn fetch_objects_paginated(
        &self,
        board_id: Uuid,
        cursor: Option<u64>,
        limit: usize,
    ) -> Result<Page, RepositoryError>;

    /// Every delta after `since`, then live deltas as they land.
    ///
    /// # Errors
    ///
    /// Network or permission failures while subscribing.
    async fn subscribe_to_delta_updates(
        &self,
        board_id: Uuid,
        since: u64,
    ) -> Result<mpsc::UnboundedReceiver<Delta>, RepositoryError>;
}

/// Best-effort realtime channel for uncommitted drag positions.
#[async_trait::async_trait]
pub trait DragChannel: Send + Sync {
    /// # Errors
    ///
    /// Network failures. Callers treat these as droppable.
    async fn publish_drag_update(&self, update: DragUpdate) -> Result<(), RepositoryError>;

    /// # Errors
    ///
    /// Network or permission failures while subscribing.
    async fn subscribe_to_drag_updates(
        &self,
        board_id: Uuid,
    ) -> Result<mpsc::UnboundedReceiver<DragUpdate>, RepositoryError>;
}

// =============================================================================
// MEMORY REPOSITORY
// =============================================================================

/// A write the repository received, for assertions in tests and the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoCall {
    CreateObject(ObjectId),
    CreateBatch(Vec<ObjectId>),
    UpdateObject { id: ObjectId, fields: PartialBoardObject },
    UpdateBatch(Vec<(ObjectId, PartialBoardObject)>),
    DeleteObject(ObjectId),
    DeleteBatch(Vec<ObjectId>),
    PublishDrag(ObjectId),
}

#[derive(Default)]
struct BoardLog {
    objects: HashMap<ObjectId, BoardObject>,
    deltas: Vec<Delta>,
    changeset_subs: Vec<mpsc::UnboundedSender<Changeset>>,
    delta_subs: Vec<mpsc::UnboundedSender<Delta>>,
    drag_subs: Vec<mpsc::UnboundedSender<DragUpdate>>,
}

#[derive(Default)]
struct Inner {
    boards: HashMap<Uuid, BoardLog>,
    calls: Vec<RepoCall>,
    failures: VecDeque<RepositoryError>,
    seq: u64,
}

/// In-process repository with a change log, subscriber fan-out and
/// scripted failures.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load objects without recording calls or notifying subscribers.
    pub fn seed(&self, objects: impl IntoIterator<Item = BoardObject>) {
        let mut inner = self.lock();
        let mut count = 0usize;
        for obj in objects {
            inner.boards.entry(obj.board_id).or_default().objects.insert(obj.id, obj);
            count += 1;
        }
        info!(count, "memory repository seeded");
    }

    /// Make the next write fail with `error`. Failures queue up in order.
    pub fn fail_next(&self, error: RepositoryError) {
        self.lock().failures.push_back(error);
    }

    /// Writes received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RepoCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    #[must_use]
    pub fn object(&self, board_id: Uuid, id: ObjectId) -> Option<BoardObject> {
        self.lock().boards.get(&board_id).and_then(|b| b.objects.get(&id).cloned())
    }

    #[must_use]
    pub fn object_count(&self, board_id: Uuid) -> usize {
        self.lock().boards.get(&board_id).map_or(0, |b| b.objects.len())
    }

    /// Latest sequence number handed out.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.lock().seq
    }

    /// Apply a changeset as if another participant wrote it.
    pub fn inject(&self, board_id: Uuid, changeset: Changeset) {
        let mut inner = self.lock();
        let board = inner.boards.entry(board_id).or_default();
        apply_to(&mut board.objects, &changeset);
        inner.publish(board_id, changeset);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, pop a scripted failure if any, else run `write`.
    fn write<F>(&self, board_id: Uuid, call: RepoCall, write: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut HashMap<ObjectId, BoardObject>) -> Result<Changeset, RepositoryError>,
    {
        let mut inner = self.lock();
        inner.calls.push(call);
        if let Some(err) = inner.failures.pop_front() {
            debug!(%board_id, error = %err, "memory repository: scripted failure");
            return Err(err);
        }
        let board = inner.boards.entry(board_id).or_default();
        let changeset = write(&mut board.objects)?;
        if !changeset.is_empty() {
            inner.publish(board_id, changeset);
        }
        Ok(())
    }
}

impl Inner {
    fn publish(&mut self, board_id: Uuid, changeset: Changeset) {
        self.seq += 1;
        let delta = Delta { seq: self.seq, changeset };
        let board = self.boards.entry(board_id).or_default();
        board.changeset_subs.retain(|tx| tx.send(delta.changeset.clone()).is_ok());
        board.delta_subs.retain(|tx| tx.send(delta.clone()).is_ok());
        board.deltas.push(delta);
    }
}

fn apply_to(objects: &mut HashMap<ObjectId, BoardObject>, changeset: &Changeset) {
    for change in &changeset.changes {
        match change {
            Change::Created { object } | Change::Updated { object } => {
                objects.insert(object.id, object.clone());
            }
            Change::Patched { id, fields } => {
                if let Some(obj) = objects.get_mut(id) {
                    obj.apply(fields);
                }
            }
            Change::Deleted { id } => {
                objects.remove(id);
            }
        }
    }
}

/// Apply field updates, failing the whole batch if any target is missing.
fn patch_all(
    objects: &mut HashMap<ObjectId, BoardObject>,
    updates: &[(ObjectId, PartialBoardObject)],
) -> Result<Changeset, RepositoryError> {
    if let Some((missing, _)) = updates.iter().find(|(id, _)| !objects.contains_key(id)) {
        return Err(RepositoryError::NotFound(*missing));
    }
    let mut changeset = Changeset::new();
    for (id, fields) in updates {
        if let Some(obj) = objects.get_mut(id) {
            obj.apply(fields);
            changeset = changeset.updated(obj.clone());
        }
    }
    Ok(changeset)
}

fn remove_all(objects: &mut HashMap<ObjectId, BoardObject>, ids: &[ObjectId]) -> Changeset {
    ids.iter()
        .filter(|id| objects.remove(id).is_some())
        .fold(Changeset::new(), |cs, id| cs.deleted(*id))
}

#[async_trait::async_trait]
impl ObjectRepository for MemoryRepository {
    async fn create_object(&self, object: &BoardObject) -> Result<(), RepositoryError> {
        self.write(object.board_id, RepoCall::CreateObject(object.id), |objects| {
            objects.insert(object.id, object.clone());
            Ok(Changeset::new().created(object.clone()))
        })
    }

    async fn create_objects_batch(&self, objects: &[BoardObject]) -> Result<(), RepositoryError> {
        let Some(first) = objects.first() else {
            return Ok(());
        };
        let ids = objects.iter().map(|o| o.id).collect();
        self.write(first.board_id, RepoCall::CreateBatch(ids), |stored| {
            let mut changeset = Changeset::new();
            for obj in objects {
                stored.insert(obj.id, obj.clone());
                changeset = changeset.created(obj.clone());
            }
            Ok(changeset)
        })
    }

    async fn update_object(
        &self,
        board_id: Uuid,
        id: ObjectId,
        fields: &PartialBoardObject,
    ) -> Result<(), RepositoryError> {
        let call = RepoCall::UpdateObject { id, fields: fields.clone() };
        self.write(board_id, call, |objects| patch_all(objects, &[(id, fields.clone())]))
    }

    async fn update_objects_batch(
        &self,
        board_id: Uuid,
        updates: &[(ObjectId, PartialBoardObject)],
    ) -> Result<(), RepositoryError> {
        self.write(board_id, RepoCall::UpdateBatch(updates.to_vec()), |objects| patch_all(objects, updates))
    }

    async fn delete_object(&self, board_id: Uuid, id: ObjectId) -> Result<(), RepositoryError> {
        self.write(board_id, RepoCall::DeleteObject(id), |objects| Ok(remove_all(objects, &[id])))
    }

    async fn delete_objects_batch(&self, board_id: Uuid, ids: &[ObjectId]) -> Result<(), RepositoryError> {
        self.write(board_id, RepoCall::DeleteBatch(ids.to_vec()), |objects| Ok(remove_all(objects, ids)))
    }

    async fn subscribe_to_objects(&self, board_id: Uuid) -> Result<mpsc::UnboundedReceiver<Changeset>, RepositoryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().boards.entry(board_id).or_default().changeset_subs.push(tx);
        Ok(rx)
    }

    async fn fetch_objects_paginated(
        &self,
        board_id: Uuid,
        cursor: Option<u64>,
        limit: usize,
    ) -> Result<Page, RepositoryError> {
        let inner = self.lock();
        let seq = inner.seq;
        let Some(board) = inner.boards.get(&board_id) else {
            return Ok(Page { objects: Vec::new(), next_cursor: None, seq });
        };
        let mut ordered: Vec<&BoardObject> = board.objects.values().collect();
        ordered.sort_by_key(|o| (o.z_index, o.id));

        let start = usize::try_from(cursor.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = limit.max(1);
        let objects: Vec<BoardObject> = ordered.iter().skip(start).take(limit).map(|o| (*o).clone()).collect();
        let end = start.saturating_add(objects.len());
        let next_cursor = (end < ordered.len()).then(|| end as u64);
        Ok(Page { objects, next_cursor, seq })
    }

    async fn subscribe_to_delta_updates(
        &self,
        board_id: Uuid,
        since: u64,
    ) -> Result<mpsc::UnboundedReceiver<Delta>, RepositoryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let board = inner.boards.entry(board_id).or_default();
        let mut replayed = 0usize;
        for delta in board.deltas.iter().filter(|d| d.seq > since) {
            if tx.send(delta.clone()).is_err() {
                return Err(RepositoryError::Closed);
            }
            replayed += 1;
        }
        board.delta_subs.push(tx);
        debug!(%board_id, since, replayed, "delta subscription opened");
        Ok(rx)
    }
}

#[async_trait::async_trait]
impl DragChannel for MemoryRepository {
    async fn publish_drag_update(&self, update: DragUpdate) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        inner.calls.push(RepoCall::PublishDrag(update.object_id));
        if let Some(board) = inner.boards.get_mut(&update.board_id) {
            board.drag_subs.retain(|tx| tx.send(update).is_ok());
        }
        Ok(())
    }

    async fn subscribe_to_drag_updates(
        &self,
        board_id: Uuid,
    ) -> Result<mpsc::UnboundedReceiver<DragUpdate>, RepositoryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().boards.entry(board_id).or_default().drag_subs.push(tx);
        Ok(rx)
    }
}
