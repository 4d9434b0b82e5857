use uuid::Uuid;

use super::*;
use crate::doc::Shape;

fn rect_obj(x: f64, y: f64, w: f64, h: f64, z: i64) -> BoardObject {
    let mut obj = BoardObject::new(Uuid::nil(), Shape::Rect { text: String::new() }, Rect::new(x, y, w, h));
    obj.z_index = z;
    obj
}

fn connector(points: Vec<Point>) -> BoardObject {
    BoardObject::new(Uuid::nil(), Shape::Connector { points, start_id: None, end_id: None }, Rect::default())
}

// =============================================================
// hit_test
// =============================================================

#[test]
fn hit_test_empty_doc_misses() {
    assert_eq!(hit_test(&DocStore::new(), Point::new(0.0, 0.0), 0.0), None);
}

#[test]
fn hit_test_picks_highest_z() {
    let mut doc = DocStore::new();
    let low = rect_obj(0.0, 0.0, 100.0, 100.0, 1);
    let high = rect_obj(50.0, 50.0, 100.0, 100.0, 9);
    let high_id = high.id;
    doc.insert(low);
    doc.insert(high);
    assert_eq!(hit_test(&doc, Point::new(75.0, 75.0), 0.0), Some(high_id));
}

#[test]
fn hit_test_z_tie_breaks_on_larger_id() {
    let mut doc = DocStore::new();
    let a = rect_obj(0.0, 0.0, 10.0, 10.0, 0);
    let b = rect_obj(0.0, 0.0, 10.0, 10.0, 0);
    let expected = a.id.max(b.id);
    doc.insert(a);
    doc.insert(b);
    assert_eq!(hit_test(&doc, Point::new(5.0, 5.0), 0.0), Some(expected));
}

#[test]
fn hit_test_outside_bounds_misses_even_in_same_cell() {
    let mut doc = DocStore::with_cell_size(1000.0);
    doc.insert(rect_obj(0.0, 0.0, 10.0, 10.0, 0));
    assert_eq!(hit_test(&doc, Point::new(50.0, 50.0), 0.0), None);
}

#[test]
fn horizontal_connector_needs_slop() {
    let mut doc = DocStore::new();
    let line = connector(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
    let id = line.id;
    doc.insert(line);
    assert_eq!(hit_test(&doc, Point::new(50.0, 3.0), 0.0), None);
    assert_eq!(hit_test(&doc, Point::new(50.0, 3.0), 5.0), Some(id));
}

#[test]
fn slop_does_not_grow_solid_shapes() {
    let mut doc = DocStore::new();
    doc.insert(rect_obj(0.0, 0.0, 10.0, 10.0, 0));
    assert_eq!(hit_test(&doc, Point::new(13.0, 5.0), 5.0), None);
}

// =============================================================
// selection_bounds / pick
// =============================================================

#[test]
fn selection_bounds_unions_live_ids() {
    let mut doc = DocStore::new();
    let a = rect_obj(0.0, 0.0, 10.0, 10.0, 0);
    let b = rect_obj(100.0, 50.0, 10.0, 10.0, 0);
    let ids = [a.id, b.id, Uuid::new_v4()];
    doc.insert(a);
    doc.insert(b);
    assert_eq!(selection_bounds(&doc, &ids), Some(Rect::new(0.0, 0.0, 110.0, 60.0)));
}

#[test]
fn selection_bounds_of_nothing_is_none() {
    assert_eq!(selection_bounds(&DocStore::new(), &[Uuid::new_v4()]), None);
}

#[test]
fn pick_inside_multi_selection_gap_hits_bounds() {
    let mut doc = DocStore::new();
    let a = rect_obj(0.0, 0.0, 10.0, 10.0, 0);
    let b = rect_obj(100.0, 100.0, 10.0, 10.0, 0);
    let sel = [a.id, b.id];
    doc.insert(a);
    doc.insert(b);
    assert_eq!(pick(&doc, Point::new(50.0, 50.0), 0.0, &sel), Some(Hit::SelectionBounds));
}

#[test]
fn pick_single_selection_returns_object() {
    let mut doc = DocStore::new();
    let a = rect_obj(0.0, 0.0, 10.0, 10.0, 0);
    let id = a.id;
    doc.insert(a);
    assert_eq!(pick(&doc, Point::new(5.0, 5.0), 0.0, &[id]), Some(Hit::Object(id)));
    assert_eq!(pick(&doc, Point::new(50.0, 50.0), 0.0, &[id]), None);
}

// =============================================================
// enclosed_by
// =============================================================

#[test]
fn marquee_selects_only_fully_enclosed() {
    let mut doc = DocStore::new();
    let inside = rect_obj(10.0, 10.0, 10.0, 10.0, 0);
    let straddling = rect_obj(90.0, 90.0, 20.0, 20.0, 0);
    let inside_id = inside.id;
    doc.insert(inside);
    doc.insert(straddling);
    assert_eq!(enclosed_by(&doc, &Rect::new(0.0, 0.0, 100.0, 100.0)), vec![inside_id]);
}
