#![allow(clippy::float_cmp)]

use serde_json::json;
use uuid::Uuid;

use super::*;

fn note_at(x: f64, y: f64, w: f64, h: f64) -> BoardObject {
    BoardObject::new(Uuid::nil(), Shape::StickyNote { text: String::new() }, Rect::new(x, y, w, h))
}

fn frame_at(x: f64, y: f64, w: f64, h: f64) -> BoardObject {
    BoardObject::new(Uuid::nil(), Shape::Frame { title: "F".into() }, Rect::new(x, y, w, h))
}

fn everything() -> Rect {
    Rect::new(-1e9, -1e9, 2e9, 2e9)
}

// =============================================================
// ObjectKind / Shape serde
// =============================================================

#[test]
fn kind_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&ObjectKind::StickyNote).unwrap(), "\"sticky_note\"");
    assert_eq!(serde_json::to_string(&ObjectKind::Freehand).unwrap(), "\"freehand\"");
}

#[test]
fn kind_deserialize_invalid_rejects() {
    assert!(serde_json::from_str::<ObjectKind>("\"hexagon\"").is_err());
}

#[test]
fn kind_reparent_rules() {
    assert!(ObjectKind::StickyNote.can_be_reparented());
    assert!(ObjectKind::Freehand.can_be_reparented());
    assert!(!ObjectKind::Frame.can_be_reparented());
    assert!(!ObjectKind::Connector.can_be_reparented());
}

#[test]
fn object_serializes_shape_inline() {
    let obj = note_at(1.0, 2.0, 3.0, 4.0);
    let value = serde_json::to_value(&obj).unwrap();
    assert_eq!(value["kind"], "sticky_note");
    assert_eq!(value["text"], "");
    assert_eq!(value["x"], 1.0);
}

#[test]
fn object_serde_roundtrip_path_shape() {
    let mut obj = BoardObject::new(
        Uuid::new_v4(),
        Shape::Connector { points: vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)], start_id: None, end_id: None },
        Rect::new(5.0, 5.0, 10.0, 5.0),
    );
    obj.parent_frame_id = None;
    let back: BoardObject = serde_json::from_str(&serde_json::to_string(&obj).unwrap()).unwrap();
    assert_eq!(back, obj);
}

#[test]
fn object_with_unknown_kind_rejects() {
    let raw = json!({
        "id": Uuid::nil(), "board_id": Uuid::nil(), "kind": "hexagon",
        "x": 0.0, "y": 0.0, "width": 1.0, "height": 1.0
    });
    assert!(serde_json::from_value::<BoardObject>(raw).is_err());
}

#[test]
fn object_missing_optional_fields_uses_defaults() {
    let raw = json!({
        "id": Uuid::nil(), "board_id": Uuid::nil(), "kind": "text",
        "x": 0.0, "y": 0.0, "width": 1.0, "height": 1.0
    });
    let obj: BoardObject = serde_json::from_value(raw).unwrap();
    assert_eq!(obj.shape, Shape::Text { text: String::new(), font_size: 16.0 });
    assert_eq!(obj.style, Style::default());
    assert!(obj.parent_frame_id.is_none());
}

// =============================================================
// BoardObject
// =============================================================

#[test]
fn bounds_of_unrotated_rect_is_rect() {
    let obj = note_at(10.0, 20.0, 30.0, 40.0);
    assert_eq!(obj.bounds(), Rect::new(10.0, 20.0, 30.0, 40.0));
}

#[test]
fn bounds_of_rotated_square_grows() {
    let mut obj = note_at(0.0, 0.0, 100.0, 100.0);
    obj.rotation = 45.0;
    let b = obj.bounds();
    let diag = 100.0 * std::f64::consts::SQRT_2;
    assert!((b.width - diag).abs() < 1e-9);
    assert!((b.center().x - 50.0).abs() < 1e-9);
}

#[test]
fn bounds_of_path_follows_points() {
    let obj = BoardObject::new(
        Uuid::nil(),
        Shape::Freehand { points: vec![Point::new(0.0, 0.0), Point::new(20.0, -10.0)] },
        Rect::new(100.0, 100.0, 0.0, 0.0),
    );
    assert_eq!(obj.bounds(), Rect::new(100.0, 90.0, 20.0, 10.0));
}

#[test]
fn apply_ignores_fields_foreign_to_kind() {
    let mut obj = frame_at(0.0, 0.0, 10.0, 10.0);
    let partial = PartialBoardObject {
        text: Some("Sprint".into()),
        points: Some(vec![Point::new(1.0, 1.0)]),
        ..Default::default()
    };
    let geometry = obj.apply(&partial);
    assert!(!geometry);
    assert_eq!(obj.shape, Shape::Frame { title: "Sprint".into() });
}

#[test]
fn apply_reports_geometry_change() {
    let mut obj = note_at(0.0, 0.0, 10.0, 10.0);
    assert!(obj.apply(&PartialBoardObject::position(5.0, 5.0)));
    assert!(!obj.apply(&PartialBoardObject { fill: Some("#000".into()), ..Default::default() }));
    assert_eq!(obj.style.fill, "#000");
}

// =============================================================
// PartialBoardObject
// =============================================================

#[test]
fn partial_default_is_empty() {
    assert!(PartialBoardObject::default().is_empty());
    assert!(!PartialBoardObject::position(0.0, 0.0).is_empty());
}

#[test]
fn partial_skips_absent_fields() {
    let p = PartialBoardObject { x: Some(10.0), ..Default::default() };
    let s = serde_json::to_string(&p).unwrap();
    assert_eq!(s, "{\"x\":10.0}");
}

#[test]
fn partial_parent_absent_vs_null() {
    let absent: PartialBoardObject = serde_json::from_str("{}").unwrap();
    assert_eq!(absent.parent_frame_id, None);

    let cleared: PartialBoardObject = serde_json::from_str("{\"parent_frame_id\":null}").unwrap();
    assert_eq!(cleared.parent_frame_id, Some(None));

    let id = Uuid::new_v4();
    let set: PartialBoardObject = serde_json::from_value(json!({ "parent_frame_id": id })).unwrap();
    assert_eq!(set.parent_frame_id, Some(Some(id)));
}

#[test]
fn partial_cleared_parent_serializes_null() {
    let p = PartialBoardObject { parent_frame_id: Some(None), ..Default::default() };
    assert_eq!(serde_json::to_string(&p).unwrap(), "{\"parent_frame_id\":null}");
}

#[test]
fn merge_newer_fields_win_and_others_survive() {
    let mut a = PartialBoardObject { x: Some(1.0), y: Some(1.0), fill: Some("red".into()), ..Default::default() };
    let b = PartialBoardObject { x: Some(2.0), width: Some(9.0), ..Default::default() };
    a.merge(&b);
    assert_eq!(a.x, Some(2.0));
    assert_eq!(a.y, Some(1.0));
    assert_eq!(a.width, Some(9.0));
    assert_eq!(a.fill.as_deref(), Some("red"));
}

#[test]
fn capture_snapshots_only_touched_fields() {
    let mut obj = note_at(3.0, 4.0, 5.0, 6.0);
    obj.shape = Shape::StickyNote { text: "old".into() };
    let fields = PartialBoardObject { x: Some(99.0), text: Some("new".into()), ..Default::default() };
    let before = PartialBoardObject::capture(&obj, &fields);
    assert_eq!(before.x, Some(3.0));
    assert_eq!(before.y, None);
    assert_eq!(before.text.as_deref(), Some("old"));

    obj.apply(&fields);
    obj.apply(&before);
    assert_eq!(obj.x, 3.0);
    assert_eq!(obj.shape.text(), Some("old"));
}

// =============================================================
// Changeset
// =============================================================

#[test]
fn changeset_ids_dedup_in_order() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let cs = Changeset::new()
        .patched(a, PartialBoardObject::position(1.0, 1.0))
        .deleted(b)
        .patched(a, PartialBoardObject::position(2.0, 2.0));
    assert_eq!(cs.ids(), vec![a, b]);
    assert_eq!(cs.len(), 3);
}

#[test]
fn changeset_serde_uses_op_tag() {
    let id = Uuid::nil();
    let cs = Changeset::new().deleted(id);
    let value = serde_json::to_value(&cs).unwrap();
    assert_eq!(value["changes"][0]["op"], "deleted");
}

// =============================================================
// DocStore: mutations keep index in step
// =============================================================

#[test]
fn set_all_rebuilds_index() {
    let mut store = DocStore::new();
    store.insert(note_at(0.0, 0.0, 10.0, 10.0));
    let objs = vec![note_at(500.0, 500.0, 10.0, 10.0), note_at(900.0, 0.0, 10.0, 10.0)];
    let ids: HashSet<_> = objs.iter().map(|o| o.id).collect();
    store.set_all(objs);
    assert_eq!(store.len(), 2);
    assert_eq!(store.candidates(&everything()), ids);
    assert_eq!(store.index().len(), 2);
}

#[test]
fn apply_partial_moves_index_entry() {
    let mut store = DocStore::with_cell_size(100.0);
    let obj = note_at(0.0, 0.0, 10.0, 10.0);
    let id = obj.id;
    store.insert(obj);
    assert!(store.apply_partial(&id, &PartialBoardObject::position(1000.0, 1000.0)));
    assert!(store.candidates(&Rect::new(0.0, 0.0, 50.0, 50.0)).is_empty());
    assert!(store.candidates(&Rect::new(990.0, 990.0, 50.0, 50.0)).contains(&id));
}

#[test]
fn apply_partial_missing_returns_false() {
    let mut store = DocStore::new();
    let rev = store.revision();
    assert!(!store.apply_partial(&Uuid::new_v4(), &PartialBoardObject::position(1.0, 1.0)));
    assert_eq!(store.revision(), rev);
}

#[test]
fn remove_drops_from_index() {
    let mut store = DocStore::new();
    let obj = note_at(0.0, 0.0, 10.0, 10.0);
    let id = obj.id;
    store.insert(obj);
    assert!(store.remove(&id).is_some());
    assert!(store.candidates(&everything()).is_empty());
    assert!(store.remove(&id).is_none());
}

#[test]
fn changeset_applies_in_order() {
    let mut store = DocStore::new();
    let obj = note_at(0.0, 0.0, 10.0, 10.0);
    let id = obj.id;
    let cs = Changeset::new()
        .created(obj)
        .patched(id, PartialBoardObject::position(50.0, 60.0))
        .patched(id, PartialBoardObject { x: Some(70.0), ..Default::default() });
    let summary = store.apply_changeset(&cs);
    assert_eq!(summary.upserted, vec![id, id, id]);
    let stored = store.get(&id).unwrap();
    assert_eq!((stored.x, stored.y), (70.0, 60.0));
}

#[test]
fn changeset_application_is_idempotent() {
    let mut store = DocStore::new();
    let keep = note_at(0.0, 0.0, 10.0, 10.0);
    let doomed = note_at(100.0, 0.0, 10.0, 10.0);
    store.set_all(vec![keep.clone(), doomed.clone()]);

    let mut moved = keep.clone();
    moved.x = 300.0;
    let fresh = note_at(-50.0, -50.0, 5.0, 5.0);
    let cs = Changeset::new().updated(moved).deleted(doomed.id).created(fresh);

    store.apply_changeset(&cs);
    let once: Vec<BoardObject> = store.sorted_objects().into_iter().cloned().collect();
    let once_index = store.candidates(&everything());

    let summary = store.apply_changeset(&cs);
    let twice: Vec<BoardObject> = store.sorted_objects().into_iter().cloned().collect();
    assert_eq!(once, twice);
    assert_eq!(once_index, store.candidates(&everything()));
    assert!(summary.deleted.is_empty());
}

#[test]
fn patch_on_missing_object_reported() {
    let mut store = DocStore::new();
    let ghost = Uuid::new_v4();
    let summary = store.apply_changeset(&Changeset::new().patched(ghost, PartialBoardObject::position(1.0, 1.0)));
    assert_eq!(summary.missing, vec![ghost]);
    assert!(store.is_empty());
}

#[test]
fn store_and_index_agree_after_mixed_sequence() {
    let mut store = DocStore::with_cell_size(50.0);
    let mut ids = Vec::new();
    for i in 0..20 {
        let obj = note_at(f64::from(i) * 37.0, f64::from(i) * -13.0, 20.0, 20.0);
        ids.push(obj.id);
        store.insert(obj);
    }
    for id in ids.iter().step_by(3) {
        store.apply_partial(id, &PartialBoardObject::position(5000.0, 5000.0));
    }
    for id in ids.iter().step_by(4) {
        store.remove(id);
    }
    assert_eq!(store.candidates(&everything()), store.ids());
}

// =============================================================
// DocStore: frames and parents
// =============================================================

#[test]
fn frame_children_and_frames_selectors() {
    let mut store = DocStore::new();
    let frame = frame_at(0.0, 0.0, 300.0, 300.0);
    let mut a = note_at(10.0, 10.0, 10.0, 10.0);
    a.parent_frame_id = Some(frame.id);
    a.z_index = 2;
    let mut b = note_at(20.0, 20.0, 10.0, 10.0);
    b.parent_frame_id = Some(frame.id);
    b.z_index = 1;
    let loose = note_at(500.0, 500.0, 10.0, 10.0);
    let (fid, aid, bid) = (frame.id, a.id, b.id);
    store.set_all(vec![frame, a, b, loose]);

    let children: Vec<ObjectId> = store.frame_children(&fid).iter().map(|o| o.id).collect();
    assert_eq!(children, vec![bid, aid]);
    assert_eq!(store.frames().len(), 1);
}

#[test]
fn deleting_frame_detaches_children() {
    let mut store = DocStore::new();
    let frame = frame_at(0.0, 0.0, 300.0, 300.0);
    let mut child = note_at(10.0, 10.0, 10.0, 10.0);
    child.parent_frame_id = Some(frame.id);
    let (fid, cid) = (frame.id, child.id);
    store.set_all(vec![frame, child]);

    let summary = store.apply_changeset(&Changeset::new().deleted(fid));
    assert_eq!(summary.detached, vec![cid]);
    assert!(store.get(&cid).unwrap().parent_frame_id.is_none());
}

#[test]
fn snapshot_with_dangling_parent_is_cleaned() {
    let mut store = DocStore::new();
    let mut child = note_at(0.0, 0.0, 10.0, 10.0);
    child.parent_frame_id = Some(Uuid::new_v4());
    let cid = child.id;
    let detached = store.set_all(vec![child]);
    assert_eq!(detached, vec![cid]);
}

#[test]
fn parent_pointing_at_non_frame_is_cleared() {
    let mut store = DocStore::new();
    let note = note_at(0.0, 0.0, 10.0, 10.0);
    let mut child = note_at(0.0, 0.0, 5.0, 5.0);
    child.parent_frame_id = Some(note.id);
    let cid = child.id;
    store.insert(note);
    store.insert(child);
    assert!(store.get(&cid).unwrap().parent_frame_id.is_none());
}

// =============================================================
// DocStore: visibility
// =============================================================

#[test]
fn visible_ids_filters_exactly_and_orders_by_z() {
    let mut store = DocStore::with_cell_size(1000.0);
    let mut top = note_at(10.0, 10.0, 10.0, 10.0);
    top.z_index = 5;
    let mut bottom = note_at(40.0, 40.0, 10.0, 10.0);
    bottom.z_index = -1;
    // Same cell as the viewport but outside it.
    let outside = note_at(500.0, 500.0, 10.0, 10.0);
    let (tid, bid) = (top.id, bottom.id);
    store.set_all(vec![top, bottom, outside]);

    let visible = store.visible_ids(&Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(visible, vec![bid, tid]);
}

#[test]
fn max_z_tracks_highest() {
    let mut store = DocStore::new();
    assert_eq!(store.max_z(), None);
    let mut a = note_at(0.0, 0.0, 1.0, 1.0);
    a.z_index = 7;
    store.insert(a);
    assert_eq!(store.max_z(), Some(7));
}
