//! State-sync engine for a collaborative infinite canvas.
//!
//! This crate holds the client-side half of a shared whiteboard: an
//! in-memory document of board objects with a spatial index, optimistic
//! local mutations that reach the remote repository through a coalescing
//! write queue, drag gestures with snapping and frame reparenting, and a
//! command-log undo/redo. Rendering and transport are external
//! collaborators; the engine hands out scene descriptors and talks to the
//! repository through async traits.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::Session`], the per-board surface hosts drive |
//! | [`doc`] | Board object types, changesets and the document store |
//! | [`spatial`] | Grid-hash index behind viewport and hit queries |
//! | [`geometry`] | `Point` and `Rect` |
//! | [`validate`] | Boundary checks for records and sparse updates |
//! | [`hit`] | Hit-testing, selection bounds, marquee containment |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`snap`] | Grid snapping and alignment guides |
//! | [`drag`] | Drag state machine and the frame containment rule |
//! | [`transient`] | Per-frame drag offsets and remote drag previews |
//! | [`history`] | Invertible commands and the undo/redo stacks |
//! | [`repository`] | Repository and realtime traits, in-memory implementation |
//! | [`queue`] | Coalescing write queue worker |
//! | [`presence`] | Throttled drag-position publisher |
//! | [`sync`] | Board hydration and the live delta feed |
//! | [`render`] | Redraw scheduling and scene descriptors |
//! | [`subscribe`] | Selector-based change notifications |
//! | [`clock`] | Injected time source |
//! | [`config`] | `BOARDSYNC_*` environment configuration |
//! | [`error`] | Error enums and the [`error::ErrorCode`] trait |
//! | [`consts`] | Shared numeric defaults |

pub mod camera;
pub mod clock;
pub mod config;
pub mod consts;
pub mod doc;
pub mod drag;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod history;
pub mod hit;
pub mod presence;
pub mod queue;
pub mod render;
pub mod repository;
pub mod snap;
pub mod spatial;
pub mod subscribe;
pub mod sync;
pub mod transient;
pub mod validate;
