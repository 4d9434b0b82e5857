//! Shared numeric defaults for the sync engine.

// ── Spatial index ───────────────────────────────────────────────

/// Side length of one grid cell in world units. A 20k-unit board spans
/// about 100 cells per axis.
pub const DEFAULT_CELL_SIZE: f64 = 200.0;

/// Objects covering more cells than this live in the oversized list instead
/// of being stamped into every cell.
pub const MAX_CELLS_PER_OBJECT: usize = 4096;

// ── History ─────────────────────────────────────────────────────

/// Maximum undo depth; the oldest entry is dropped past this.
pub const HISTORY_MAX_DEPTH: usize = 50;

// ── Write queue ─────────────────────────────────────────────────

/// Coalescing window for outbound updates, in milliseconds.
pub const WRITE_BATCH_MS: u64 = 30;

// ── Drag ────────────────────────────────────────────────────────

/// Minimum interval between drop-target recomputations, in milliseconds.
pub const DROP_TARGET_INTERVAL_MS: u64 = 60;

/// Alignment-guide capture distance in screen pixels.
pub const SNAP_TOLERANCE_PX: f64 = 6.0;

/// Grid pitch in world units.
pub const GRID_SIZE: f64 = 20.0;

/// Movements smaller than this (world units) are not committed.
pub const COMMIT_EPSILON: f64 = 0.01;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for thin connectors.
pub const HIT_SLOP_PX: f64 = 6.0;

// ── Realtime presence ───────────────────────────────────────────

/// Minimum spacing between drag-position publishes for one object, in milliseconds.
pub const DRAG_PUBLISH_INTERVAL_MS: u64 = 50;

/// How long a remote drag preview survives without a fresh update, in milliseconds.
pub const REMOTE_DRAG_TTL_MS: u64 = 3000;

// ── Loading ─────────────────────────────────────────────────────

/// Page size used when hydrating a board from the repository.
pub const PAGE_SIZE: usize = 500;
