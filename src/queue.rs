//! Outbound write queue: coalesces local edits and dispatches them to the
//! repository in batches.
//!
//! DESIGN
//! ======
//! Local edits are applied to the store first and queued here second, so
//! the network never sits between a pointer event and the next frame. The
//! worker holds edits for one batch window after the first arrives, then
//! dispatches everything pending:
//!
//! - an update merges into any pending create or update for the same id,
//!   newer fields winning (field-level last-write-wins in arrival order)
//! - a delete replaces whatever was pending for that id
//! - a create replaces a pending delete (undo of a delete)
//!
//! Each kind goes out as a single call when one object is pending and as a
//! batch call otherwise. Creates go first, then updates, then deletes.
//!
//! ERROR HANDLING
//! ==============
//! A failed dispatch is logged and published as a [`WriteFailure`]. Nothing
//! is rolled back locally and nothing is retried here; the local store stays
//! authoritative for this user until a newer remote changeset lands.

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::doc::{BoardObject, ObjectId, PartialBoardObject};
use crate::error::{ErrorCode, RepositoryError, WriteQueueError};
use crate::repository::ObjectRepository;

// =============================================================================
// PENDING WRITES
// =============================================================================

/// Net effect queued for one object.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    Create(BoardObject),
    Update(PartialBoardObject),
    Delete,
}

/// Everything pending for one board, grouped the way it will be dispatched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub board_id: Uuid,
    pub creates: Vec<BoardObject>,
    pub updates: Vec<(ObjectId, PartialBoardObject)>,
    pub deletes: Vec<ObjectId>,
}

impl WriteBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-object merge buffer. Pure; the worker owns one.
#[derive(Debug, Clone, Default)]
pub struct PendingWrites {
    ops: HashMap<ObjectId, (Uuid, PendingOp)>,
    order: Vec<ObjectId>,
}

impl PendingWrites {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, object: BoardObject) {
        let (board_id, id) = (object.board_id, object.id);
        self.put(board_id, id, PendingOp::Create(object));
    }

    /// Merge `fields` into whatever is pending for `id`.
    pub fn update(&mut self, board_id: Uuid, id: ObjectId, fields: &PartialBoardObject) {
        match self.ops.get_mut(&id) {
            Some((_, PendingOp::Create(obj))) => {
                obj.apply(fields);
            }
            Some((_, PendingOp::Update(pending))) => pending.merge(fields),
            Some((_, PendingOp::Delete)) => {
                debug!(%id, "write queue: update after delete ignored");
            }
            None => self.put(board_id, id, PendingOp::Update(fields.clone())),
        }
    }

    pub fn delete(&mut self, board_id: Uuid, id: ObjectId) {
        self.put(board_id, id, PendingOp::Delete);
    }

    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&PendingOp> {
        self.ops.get(id).map(|(_, op)| op)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Empty the buffer into per-board batches, boards in first-seen order.
    pub fn drain(&mut self) -> Vec<WriteBatch> {
        let mut batches: Vec<WriteBatch> = Vec::new();
        for id in std::mem::take(&mut self.order) {
            let Some((board_id, op)) = self.ops.remove(&id) else {
                continue;
            };
            let idx = match batches.iter().position(|b| b.board_id == board_id) {
                Some(idx) => idx,
                None => {
                    batches.push(WriteBatch { board_id, ..WriteBatch::default() });
                    batches.len() - 1
                }
            };
            let batch = &mut batches[idx];
            match op {
                PendingOp::Create(obj) => batch.creates.push(obj),
                PendingOp::Update(fields) => batch.updates.push((id, fields)),
                PendingOp::Delete => batch.deletes.push(id),
            }
        }
        batches
    }

    fn put(&mut self, board_id: Uuid, id: ObjectId, op: PendingOp) {
        if self.ops.insert(id, (board_id, op)).is_none() {
            self.order.push(id);
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// Which repository call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

/// A dispatch the repository rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    pub board_id: Uuid,
    pub kind: WriteKind,
    pub ids: Vec<ObjectId>,
    pub error: RepositoryError,
}

enum QueueMsg {
    Create(BoardObject),
    Update { board_id: Uuid, id: ObjectId, fields: PartialBoardObject },
    Delete { board_id: Uuid, id: ObjectId },
    Flush(Option<oneshot::Sender<usize>>),
}

/// Cheap handle to the write-queue worker.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<QueueMsg>,
}

impl std::fmt::Debug for QueueMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(obj) => write!(f, "Create({})", obj.id),
            Self::Update { id, .. } => write!(f, "Update({id})"),
            Self::Delete { id, .. } => write!(f, "Delete({id})"),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl WriteQueue {
    /// # Errors
    ///
    /// [`WriteQueueError::Stopped`] if the worker is gone.
    pub fn queue_create(&self, object: BoardObject) -> Result<(), WriteQueueError> {
        self.send(QueueMsg::Create(object))
    }

    /// # Errors
    ///
    /// [`WriteQueueError::Stopped`] if the worker is gone.
    pub fn queue_update(&self, board_id: Uuid, id: ObjectId, fields: PartialBoardObject) -> Result<(), WriteQueueError> {
        self.send(QueueMsg::Update { board_id, id, fields })
    }

    /// # Errors
    ///
    /// [`WriteQueueError::Stopped`] if the worker is gone.
    pub fn queue_delete(&self, board_id: Uuid, id: ObjectId) -> Result<(), WriteQueueError> {
        self.send(QueueMsg::Delete { board_id, id })
    }

    /// Ask the worker to dispatch now without waiting for the result.
    ///
    /// # Errors
    ///
    /// [`WriteQueueError::Stopped`] if the worker is gone.
    pub fn request_flush(&self) -> Result<(), WriteQueueError> {
        self.send(QueueMsg::Flush(None))
    }

    /// Dispatch everything pending and wait for the repository to answer.
    ///
    /// # Errors
    ///
    /// [`WriteQueueError::Stopped`] if the worker is gone,
    /// [`WriteQueueError::DispatchFailed`] if any call in the flush failed.
    pub async fn flush(&self) -> Result<(), WriteQueueError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(QueueMsg::Flush(Some(done_tx)))?;
        match done_rx.await {
            Ok(0) => Ok(()),
            Ok(failed) => Err(WriteQueueError::DispatchFailed { failed }),
            Err(_) => Err(WriteQueueError::Stopped),
        }
    }

    fn send(&self, msg: QueueMsg) -> Result<(), WriteQueueError> {
        self.tx.send(msg).map_err(|_| WriteQueueError::Stopped)
    }
}

/// Spawn the write-queue worker. It runs until every [`WriteQueue`] handle
/// is dropped, dispatching whatever is still pending on the way out.
#[must_use]
pub fn spawn_write_queue(
    repo: Arc<dyn ObjectRepository>,
    window: Duration,
) -> (WriteQueue, mpsc::UnboundedReceiver<WriteFailure>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<QueueMsg>();
    let (failure_tx, failure_rx) = mpsc::unbounded_channel::<WriteFailure>();

    info!(window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX), "write queue configured");

    tokio::spawn(async move {
        let mut pending = PendingWrites::new();
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                maybe_msg = rx.recv() => {
                    let Some(msg) = maybe_msg else {
                        dispatch(repo.as_ref(), &mut pending, &failure_tx).await;
                        break;
                    };
                    match msg {
                        QueueMsg::Create(obj) => pending.create(obj),
                        QueueMsg::Update { board_id, id, fields } => pending.update(board_id, id, &fields),
                        QueueMsg::Delete { board_id, id } => pending.delete(board_id, id),
                        QueueMsg::Flush(done) => {
                            let failed = dispatch(repo.as_ref(), &mut pending, &failure_tx).await;
                            deadline = None;
                            if let Some(done) = done {
                                if done.send(failed).is_err() {
                                    debug!("write queue: flush waiter went away");
                                }
                            }
                            continue;
                        }
                    }
                    if deadline.is_none() && !pending.is_empty() {
                        deadline = Some(Instant::now() + window);
                    }
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    dispatch(repo.as_ref(), &mut pending, &failure_tx).await;
                }
            }
        }
        debug!("write queue worker stopped");
    });

    (WriteQueue { tx }, failure_rx)
}

/// Send everything pending. Returns the number of failed calls.
async fn dispatch(
    repo: &dyn ObjectRepository,
    pending: &mut PendingWrites,
    failures: &mpsc::UnboundedSender<WriteFailure>,
) -> usize {
    let mut failed = 0;
    for batch in pending.drain() {
        debug!(
            board_id = %batch.board_id,
            creates = batch.creates.len(),
            updates = batch.updates.len(),
            deletes = batch.deletes.len(),
            "write queue: dispatching"
        );
        let board_id = batch.board_id;

        if !batch.creates.is_empty() {
            let result = match batch.creates.as_slice() {
                [one] => repo.create_object(one).await,
                many => repo.create_objects_batch(many).await,
            };
            let ids = batch.creates.iter().map(|o| o.id).collect();
            failed += report(result, board_id, WriteKind::Create, ids, failures);
        }
        if !batch.updates.is_empty() {
            let result = match batch.updates.as_slice() {
                [(id, fields)] => repo.update_object(board_id, *id, fields).await,
                many => repo.update_objects_batch(board_id, many).await,
            };
            let ids = batch.updates.iter().map(|(id, _)| *id).collect();
            failed += report(result, board_id, WriteKind::Update, ids, failures);
        }
        if !batch.deletes.is_empty() {
            let result = match batch.deletes.as_slice() {
                [id] => repo.delete_object(board_id, *id).await,
                many => repo.delete_objects_batch(board_id, many).await,
            };
            failed += report(result, board_id, WriteKind::Delete, batch.deletes, failures);
        }
    }
    failed
}

fn report(
    result: Result<(), RepositoryError>,
    board_id: Uuid,
    kind: WriteKind,
    ids: Vec<ObjectId>,
    failures: &mpsc::UnboundedSender<WriteFailure>,
) -> usize {
    let Err(error) = result else {
        return 0;
    };
    error!(
        %board_id,
        ?kind,
        count = ids.len(),
        code = error.error_code(),
        retryable = error.retryable(),
        error = %error,
        "write queue: dispatch failed"
    );
    if failures.send(WriteFailure { board_id, kind, ids, error }).is_err() {
        debug!("write queue: failure receiver dropped");
    }
    1
}
