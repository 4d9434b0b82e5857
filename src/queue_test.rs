use super::*;
use crate::doc::Shape;
use crate::geometry::Rect;
use crate::repository::{MemoryRepository, RepoCall};

const WINDOW: Duration = Duration::from_millis(30);

fn note(board_id: Uuid) -> BoardObject {
    BoardObject::new(board_id, Shape::StickyNote { text: String::new() }, Rect::new(0.0, 0.0, 10.0, 10.0))
}

fn x(v: f64) -> PartialBoardObject {
    PartialBoardObject { x: Some(v), ..Default::default() }
}

fn y(v: f64) -> PartialBoardObject {
    PartialBoardObject { y: Some(v), ..Default::default() }
}

// =============================================================
// PendingWrites
// =============================================================

#[test]
fn updates_merge_field_by_field_newest_wins() {
    let board = Uuid::new_v4();
    let id = Uuid::new_v4();
    let mut pending = PendingWrites::new();
    pending.update(board, id, &x(1.0));
    pending.update(board, id, &y(2.0));
    pending.update(board, id, &x(3.0));

    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending.get(&id),
        Some(&PendingOp::Update(PartialBoardObject { x: Some(3.0), y: Some(2.0), ..Default::default() }))
    );
}

#[test]
fn update_folds_into_pending_create() {
    let board = Uuid::new_v4();
    let obj = note(board);
    let mut pending = PendingWrites::new();
    pending.create(obj.clone());
    pending.update(board, obj.id, &x(40.0));

    let Some(PendingOp::Create(queued)) = pending.get(&obj.id) else {
        panic!("expected a pending create");
    };
    assert!((queued.x - 40.0).abs() < f64::EPSILON);
}

#[test]
fn delete_replaces_pending_work() {
    let board = Uuid::new_v4();
    let obj = note(board);
    let mut pending = PendingWrites::new();
    pending.create(obj.clone());
    pending.delete(board, obj.id);
    assert_eq!(pending.get(&obj.id), Some(&PendingOp::Delete));

    pending.update(board, obj.id, &x(1.0));
    assert_eq!(pending.get(&obj.id), Some(&PendingOp::Delete));
}

#[test]
fn create_after_delete_wins() {
    let board = Uuid::new_v4();
    let obj = note(board);
    let mut pending = PendingWrites::new();
    pending.delete(board, obj.id);
    pending.create(obj.clone());
    assert_eq!(pending.get(&obj.id), Some(&PendingOp::Create(obj)));
}

#[test]
fn drain_groups_by_board_in_arrival_order() {
    let a_board = Uuid::new_v4();
    let b_board = Uuid::new_v4();
    let a1 = note(a_board);
    let b1 = note(b_board);
    let a2 = Uuid::new_v4();
    let mut pending = PendingWrites::new();
    pending.create(a1.clone());
    pending.update(b_board, b1.id, &x(1.0));
    pending.delete(a_board, a2);

    let batches = pending.drain();
    assert!(pending.is_empty());
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].board_id, a_board);
    assert_eq!(batches[0].creates, vec![a1]);
    assert_eq!(batches[0].deletes, vec![a2]);
    assert_eq!(batches[1].board_id, b_board);
    assert_eq!(batches[1].updates, vec![(b1.id, x(1.0))]);
    assert_eq!(batches[1].len(), 1);
}

// =============================================================
// Worker
// =============================================================

fn seeded(board: Uuid, n: usize) -> (Arc<MemoryRepository>, Vec<BoardObject>) {
    let repo = Arc::new(MemoryRepository::new());
    let objects: Vec<_> = (0..n).map(|_| note(board)).collect();
    repo.seed(objects.clone());
    (repo, objects)
}

#[tokio::test(start_paused = true)]
async fn two_updates_in_one_window_dispatch_once() {
    let board = Uuid::new_v4();
    let (repo, objects) = seeded(board, 1);
    let (queue, _failures) = spawn_write_queue(repo.clone(), WINDOW);
    let id = objects[0].id;

    queue.queue_update(board, id, x(5.0)).unwrap();
    queue.queue_update(board, id, y(7.0)).unwrap();
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(
        repo.calls(),
        vec![RepoCall::UpdateObject { id, fields: PartialBoardObject::position(5.0, 7.0) }]
    );
}

#[tokio::test(start_paused = true)]
async fn nothing_leaves_before_the_window_closes() {
    let board = Uuid::new_v4();
    let (repo, objects) = seeded(board, 1);
    let (queue, _failures) = spawn_write_queue(repo.clone(), WINDOW);

    queue.queue_update(board, objects[0].id, x(5.0)).unwrap();
    tokio::time::sleep(WINDOW / 2).await;
    assert!(repo.calls().is_empty());

    tokio::time::sleep(WINDOW).await;
    assert_eq!(repo.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn several_objects_go_out_as_one_batch() {
    let board = Uuid::new_v4();
    let (repo, objects) = seeded(board, 3);
    let (queue, _failures) = spawn_write_queue(repo.clone(), WINDOW);

    for obj in &objects {
        queue.queue_update(board, obj.id, x(1.0)).unwrap();
    }
    queue.flush().await.unwrap();

    let calls = repo.calls();
    assert_eq!(calls.len(), 1);
    let RepoCall::UpdateBatch(updates) = &calls[0] else {
        panic!("expected a batch update, got {calls:?}");
    };
    assert_eq!(updates.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn flush_dispatches_immediately() {
    let board = Uuid::new_v4();
    let (repo, objects) = seeded(board, 1);
    let (queue, _failures) = spawn_write_queue(repo.clone(), Duration::from_secs(60));

    queue.queue_update(board, objects[0].id, x(2.0)).unwrap();
    queue.flush().await.unwrap();
    assert_eq!(repo.object(board, objects[0].id).unwrap().x.to_bits(), 2.0f64.to_bits());
}

#[tokio::test(start_paused = true)]
async fn create_then_delete_in_window_sends_delete_only() {
    let board = Uuid::new_v4();
    let repo = Arc::new(MemoryRepository::new());
    let (queue, _failures) = spawn_write_queue(repo.clone(), WINDOW);
    let obj = note(board);

    queue.queue_create(obj.clone()).unwrap();
    queue.queue_delete(board, obj.id).unwrap();
    queue.flush().await.unwrap();

    assert_eq!(repo.calls(), vec![RepoCall::DeleteObject(obj.id)]);
    assert!(repo.object(board, obj.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_dispatch_is_reported_not_dropped() {
    let board = Uuid::new_v4();
    let (repo, objects) = seeded(board, 1);
    let (queue, mut failures) = spawn_write_queue(repo.clone(), WINDOW);
    repo.fail_next(RepositoryError::PermissionDenied("read-only board".into()));

    queue.queue_update(board, objects[0].id, x(9.0)).unwrap();
    let err = queue.flush().await.unwrap_err();
    assert_eq!(err, WriteQueueError::DispatchFailed { failed: 1 });

    let failure = failures.recv().await.unwrap();
    assert_eq!(failure.kind, WriteKind::Update);
    assert_eq!(failure.ids, vec![objects[0].id]);
    assert!(matches!(failure.error, RepositoryError::PermissionDenied(_)));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_last_handle_drains_pending() {
    let board = Uuid::new_v4();
    let (repo, objects) = seeded(board, 1);
    let (queue, _failures) = spawn_write_queue(repo.clone(), Duration::from_secs(60));

    queue.queue_update(board, objects[0].id, x(3.0)).unwrap();
    drop(queue);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(repo.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_flush_is_ok() {
    let repo = Arc::new(MemoryRepository::new());
    let (queue, _failures) = spawn_write_queue(repo.clone(), WINDOW);
    queue.flush().await.unwrap();
    assert!(repo.calls().is_empty());
}
