#![allow(clippy::float_cmp)]

use std::collections::HashMap;

use uuid::Uuid;

use super::*;
use crate::doc::Shape;
use crate::geometry::Rect;

/// In-memory context that records the order of calls.
#[derive(Default)]
struct MockCtx {
    objects: HashMap<ObjectId, BoardObject>,
    log: Vec<(&'static str, ObjectId)>,
}

impl HistoryContext for MockCtx {
    fn create(&mut self, obj: BoardObject) -> Result<(), HistoryError> {
        self.log.push(("create", obj.id));
        self.objects.insert(obj.id, obj);
        Ok(())
    }

    fn update(&mut self, id: ObjectId, fields: PartialBoardObject) -> Result<(), HistoryError> {
        self.log.push(("update", id));
        let obj = self.objects.get_mut(&id).ok_or(HistoryError::StaleTarget(id))?;
        obj.apply(&fields);
        Ok(())
    }

    fn delete(&mut self, id: ObjectId) -> Result<(), HistoryError> {
        self.log.push(("delete", id));
        self.objects.remove(&id).map(|_| ()).ok_or(HistoryError::StaleTarget(id))
    }

    fn list(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }
}

fn note(x: f64) -> BoardObject {
    BoardObject::new(Uuid::nil(), Shape::StickyNote { text: String::new() }, Rect::new(x, 0.0, 10.0, 10.0))
}

fn entry(label: &str, commands: Vec<Command>) -> HistoryEntry {
    HistoryEntry { label: label.into(), commands }
}

fn move_entry(obj: &BoardObject, to_x: f64) -> HistoryEntry {
    entry(
        "move",
        vec![Command::Update {
            id: obj.id,
            before: PartialBoardObject { x: Some(obj.x), ..Default::default() },
            after: PartialBoardObject { x: Some(to_x), ..Default::default() },
        }],
    )
}

// =============================================================
// execute_undo / execute_redo
// =============================================================

#[test]
fn undo_create_deletes_and_redo_recreates() {
    let obj = note(0.0);
    let mut ctx = MockCtx::default();
    ctx.objects.insert(obj.id, obj.clone());
    let e = entry("create", vec![Command::Create { after: obj.clone() }]);

    execute_undo(&e, &mut ctx);
    assert!(ctx.objects.is_empty());
    execute_redo(&e, &mut ctx);
    assert_eq!(ctx.objects.get(&obj.id), Some(&obj));
}

#[test]
fn undo_delete_restores_before_state() {
    let obj = note(42.0);
    let mut ctx = MockCtx::default();
    let e = entry("delete", vec![Command::Delete { before: obj.clone() }]);

    execute_undo(&e, &mut ctx);
    assert_eq!(ctx.objects.get(&obj.id), Some(&obj));
    execute_redo(&e, &mut ctx);
    assert!(ctx.objects.is_empty());
}

#[test]
fn update_round_trip() {
    let obj = note(0.0);
    let mut ctx = MockCtx::default();
    let mut moved = obj.clone();
    moved.x = 99.0;
    ctx.objects.insert(obj.id, moved.clone());
    let e = move_entry(&obj, 99.0);

    execute_undo(&e, &mut ctx);
    assert_eq!(ctx.objects[&obj.id].x, 0.0);
    execute_redo(&e, &mut ctx);
    assert_eq!(ctx.objects[&obj.id], moved);
}

#[test]
fn undo_runs_reverse_and_redo_runs_forward() {
    let a = note(0.0);
    let b = note(1.0);
    let mut ctx = MockCtx::default();
    ctx.objects.insert(a.id, a.clone());
    ctx.objects.insert(b.id, b.clone());
    let e = entry("pair", vec![Command::Create { after: a.clone() }, Command::Create { after: b.clone() }]);

    execute_undo(&e, &mut ctx);
    assert_eq!(ctx.log, vec![("delete", b.id), ("delete", a.id)]);
    ctx.log.clear();
    execute_redo(&e, &mut ctx);
    assert_eq!(ctx.log, vec![("create", a.id), ("create", b.id)]);
}

#[test]
fn redo_create_then_update_within_one_entry() {
    let obj = note(0.0);
    let mut ctx = MockCtx::default();
    let e = entry(
        "create+move",
        vec![
            Command::Create { after: obj.clone() },
            Command::Update {
                id: obj.id,
                before: PartialBoardObject { x: Some(0.0), ..Default::default() },
                after: PartialBoardObject { x: Some(5.0), ..Default::default() },
            },
        ],
    );
    let report = execute_redo(&e, &mut ctx);
    assert_eq!(report.applied, 2);
    assert_eq!(ctx.objects[&obj.id].x, 5.0);
}

#[test]
fn stale_target_is_swallowed_and_rest_still_runs() {
    let gone = note(0.0);
    let here = note(10.0);
    let mut ctx = MockCtx::default();
    let mut moved = here.clone();
    moved.x = 50.0;
    ctx.objects.insert(here.id, moved);

    let mut e = move_entry(&gone, 20.0);
    e.commands.extend(move_entry(&here, 50.0).commands);

    let report = execute_undo(&e, &mut ctx);
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, vec![(gone.id, HistoryError::StaleTarget(gone.id))]);
    assert_eq!(ctx.objects[&here.id].x, 10.0);
}

// =============================================================
// History stacks
// =============================================================

#[test]
fn new_history_cannot_undo_or_redo() {
    let mut history = History::default();
    let mut ctx = MockCtx::default();
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert!(history.undo(&mut ctx).is_none());
    assert!(history.redo(&mut ctx).is_none());
}

#[test]
fn empty_entry_is_not_recorded() {
    let mut history = History::default();
    history.push(HistoryEntry::new("noop"));
    assert!(!history.can_undo());
}

#[test]
fn undo_moves_entry_to_redo() {
    let obj = note(0.0);
    let mut ctx = MockCtx::default();
    ctx.objects.insert(obj.id, obj.clone());
    let mut history = History::default();
    history.push(move_entry(&obj, 5.0));

    assert!(history.undo(&mut ctx).is_some());
    assert!(!history.can_undo());
    assert!(history.can_redo());
    assert!(history.redo(&mut ctx).is_some());
    assert!(history.can_undo());
    assert!(!history.can_redo());
}

#[test]
fn push_clears_redo() {
    let obj = note(0.0);
    let mut ctx = MockCtx::default();
    ctx.objects.insert(obj.id, obj.clone());
    let mut history = History::default();
    history.push(move_entry(&obj, 5.0));
    history.undo(&mut ctx);
    history.push(move_entry(&obj, 7.0));
    assert!(!history.can_redo());
}

#[test]
fn history_keeps_most_recent_fifty() {
    let obj = note(0.0);
    let mut history = History::default();
    for i in 0..60 {
        let mut e = move_entry(&obj, f64::from(i));
        e.label = format!("e{i}");
        history.push(e);
    }
    assert_eq!(history.undo_len(), 50);
    assert_eq!(history.peek_undo().unwrap().label, "e59");

    let mut ctx = MockCtx::default();
    let mut oldest = String::new();
    while let Some(label) = history.peek_undo().map(|e| e.label.clone()) {
        oldest = label;
        history.undo(&mut ctx);
    }
    assert_eq!(oldest, "e10");
}

#[test]
fn clear_drops_both_stacks() {
    let obj = note(0.0);
    let mut ctx = MockCtx::default();
    ctx.objects.insert(obj.id, obj.clone());
    let mut history = History::with_depth(3);
    history.push(move_entry(&obj, 1.0));
    history.push(move_entry(&obj, 2.0));
    history.undo(&mut ctx);
    history.clear();
    assert!(!history.can_undo());
    assert!(!history.can_redo());
}
