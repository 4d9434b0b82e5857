//! Boundary validation for records entering the store.
//!
//! Everything arriving from a repository snapshot, a remote changeset or a
//! local API call passes through here first. The store itself assumes
//! validated input and never re-checks.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

use crate::doc::{BoardObject, Change, Changeset, DocStore, ObjectId, ObjectKind, PartialBoardObject, Shape};
use crate::error::ValidationError;
use crate::geometry::Point;

/// Reject records with non-finite geometry, negative size, or too few path points.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_object(obj: &BoardObject) -> Result<(), ValidationError> {
    let id = obj.id;
    finite(id, "x", obj.x)?;
    finite(id, "y", obj.y)?;
    finite(id, "width", obj.width)?;
    finite(id, "height", obj.height)?;
    finite(id, "rotation", obj.rotation)?;
    finite(id, "stroke_width", obj.style.stroke_width)?;
    finite(id, "opacity", obj.style.opacity)?;
    non_negative(id, "width", obj.width)?;
    non_negative(id, "height", obj.height)?;

    if let Shape::Text { font_size, .. } = obj.shape {
        finite(id, "font_size", font_size)?;
    }
    if let Some(points) = obj.shape.points() {
        points_ok(id, obj.kind(), points)?;
    }
    if obj.parent_frame_id == Some(id) {
        return Err(ValidationError::SelfParent(id));
    }
    Ok(())
}

/// Check a locally chosen parent against the store.
///
/// `parent` must be a live frame, and `kind` (the child's kind, when known)
/// must be one that takes a parent. `None` always passes.
///
/// # Errors
///
/// [`ValidationError::InvalidParent`] otherwise.
pub fn validate_parent(
    doc: &DocStore,
    id: ObjectId,
    kind: Option<ObjectKind>,
    parent: Option<ObjectId>,
) -> Result<(), ValidationError> {
    let Some(parent) = parent else {
        return Ok(());
    };
    if kind.is_none_or(ObjectKind::can_be_reparented) && doc.is_frame(&parent) {
        Ok(())
    } else {
        Err(ValidationError::InvalidParent { id, parent })
    }
}

/// Validate a sparse update aimed at `id`.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_partial(id: ObjectId, partial: &PartialBoardObject) -> Result<(), ValidationError> {
    let floats = [
        ("x", partial.x),
        ("y", partial.y),
        ("width", partial.width),
        ("height", partial.height),
        ("rotation", partial.rotation),
        ("stroke_width", partial.stroke_width),
        ("opacity", partial.opacity),
    ];
    for (field, value) in floats {
        if let Some(v) = value {
            finite(id, field, v)?;
        }
    }
    if let Some(w) = partial.width {
        non_negative(id, "width", w)?;
    }
    if let Some(h) = partial.height {
        non_negative(id, "height", h)?;
    }
    if let Some(ref points) = partial.points {
        if points.iter().any(|p| !p.is_finite()) {
            return Err(ValidationError::NonFinite { id, field: "points" });
        }
    }
    if partial.parent_frame_id == Some(Some(id)) {
        return Err(ValidationError::SelfParent(id));
    }
    Ok(())
}

/// Validate every record a changeset carries. Nothing is applied on error.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_changeset(changeset: &Changeset) -> Result<(), ValidationError> {
    for change in &changeset.changes {
        match change {
            Change::Created { object } | Change::Updated { object } => validate_object(object)?,
            Change::Patched { id, fields } => validate_partial(*id, fields)?,
            Change::Deleted { .. } => {}
        }
    }
    Ok(())
}

/// Decode and validate a raw JSON record. Unknown kinds surface as `Malformed`.
///
/// # Errors
///
/// Returns [`ValidationError::Malformed`] when decoding fails, or the
/// geometry error from [`validate_object`].
pub fn parse_object(raw: serde_json::Value) -> Result<BoardObject, ValidationError> {
    let obj: BoardObject = serde_json::from_value(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    validate_object(&obj)?;
    Ok(obj)
}

fn finite(id: ObjectId, field: &'static str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() { Ok(()) } else { Err(ValidationError::NonFinite { id, field }) }
}

fn non_negative(id: ObjectId, field: &'static str, v: f64) -> Result<(), ValidationError> {
    if v >= 0.0 { Ok(()) } else { Err(ValidationError::NegativeSize { id, field }) }
}

fn points_ok(id: ObjectId, kind: ObjectKind, points: &[Point]) -> Result<(), ValidationError> {
    let min = if kind.is_connector() { 2 } else { 1 };
    if points.len() < min {
        return Err(ValidationError::TooFewPoints { id, min, got: points.len() });
    }
    if points.iter().any(|p| !p.is_finite()) {
        return Err(ValidationError::NonFinite { id, field: "points" });
    }
    Ok(())
}
