use serde_json::json;
use uuid::Uuid;

use super::*;
use crate::geometry::Rect;

fn note() -> BoardObject {
    BoardObject::new(Uuid::new_v4(), Shape::StickyNote { text: "hi".into() }, Rect::new(0.0, 0.0, 10.0, 10.0))
}

// =============================================================
// validate_object
// =============================================================

#[test]
fn valid_object_passes() {
    assert_eq!(validate_object(&note()), Ok(()));
}

#[test]
fn nan_position_rejected() {
    let mut obj = note();
    obj.x = f64::NAN;
    assert_eq!(validate_object(&obj), Err(ValidationError::NonFinite { id: obj.id, field: "x" }));
}

#[test]
fn infinite_rotation_rejected() {
    let mut obj = note();
    obj.rotation = f64::INFINITY;
    assert!(matches!(validate_object(&obj), Err(ValidationError::NonFinite { field: "rotation", .. })));
}

#[test]
fn negative_width_rejected() {
    let mut obj = note();
    obj.width = -1.0;
    assert!(matches!(validate_object(&obj), Err(ValidationError::NegativeSize { field: "width", .. })));
}

#[test]
fn connector_needs_two_points() {
    let obj = BoardObject::new(
        Uuid::nil(),
        Shape::Connector { points: vec![Point::new(0.0, 0.0)], start_id: None, end_id: None },
        Rect::default(),
    );
    assert!(matches!(validate_object(&obj), Err(ValidationError::TooFewPoints { min: 2, got: 1, .. })));
}

#[test]
fn freehand_point_must_be_finite() {
    let obj = BoardObject::new(
        Uuid::nil(),
        Shape::Freehand { points: vec![Point::new(0.0, f64::NAN)] },
        Rect::default(),
    );
    assert!(matches!(validate_object(&obj), Err(ValidationError::NonFinite { field: "points", .. })));
}

#[test]
fn self_parent_rejected() {
    let mut obj = note();
    obj.parent_frame_id = Some(obj.id);
    assert_eq!(validate_object(&obj), Err(ValidationError::SelfParent(obj.id)));
}

// =============================================================
// validate_partial / validate_changeset
// =============================================================

#[test]
fn partial_with_nan_rejected() {
    let id = Uuid::new_v4();
    let p = PartialBoardObject { y: Some(f64::NAN), ..Default::default() };
    assert_eq!(validate_partial(id, &p), Err(ValidationError::NonFinite { id, field: "y" }));
}

#[test]
fn partial_clearing_parent_is_fine() {
    let p = PartialBoardObject { parent_frame_id: Some(None), ..Default::default() };
    assert_eq!(validate_partial(Uuid::new_v4(), &p), Ok(()));
}

#[test]
fn changeset_with_one_bad_record_rejected_whole() {
    let good = note();
    let mut bad = note();
    bad.height = f64::NEG_INFINITY;
    let cs = Changeset::new().created(good).created(bad);
    assert!(validate_changeset(&cs).is_err());
}

#[test]
fn changeset_of_deletes_always_valid() {
    let cs = Changeset::new().deleted(Uuid::new_v4());
    assert_eq!(validate_changeset(&cs), Ok(()));
}

// =============================================================
// parse_object
// =============================================================

#[test]
fn parse_unknown_kind_is_malformed() {
    let raw = json!({
        "id": Uuid::new_v4(), "board_id": Uuid::nil(), "kind": "youtube",
        "x": 0.0, "y": 0.0, "width": 1.0, "height": 1.0
    });
    assert!(matches!(parse_object(raw), Err(ValidationError::Malformed(_))));
}

#[test]
fn parse_valid_record() {
    let id = Uuid::new_v4();
    let raw = json!({
        "id": id, "board_id": Uuid::nil(), "kind": "ellipse",
        "x": 5.0, "y": 6.0, "width": 7.0, "height": 8.0
    });
    let obj = parse_object(raw).unwrap();
    assert_eq!(obj.id, id);
    assert_eq!(obj.kind(), ObjectKind::Ellipse);
}

#[test]
fn parse_negative_height_rejected() {
    let raw = json!({
        "id": Uuid::new_v4(), "board_id": Uuid::nil(), "kind": "rect",
        "x": 0.0, "y": 0.0, "width": 1.0, "height": -3.0
    });
    assert!(matches!(parse_object(raw), Err(ValidationError::NegativeSize { .. })));
}
