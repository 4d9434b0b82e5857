//! Engine tuning loaded from `BOARDSYNC_*` environment variables.
//!
//! Missing or unparsable values fall back to the defaults in [`crate::consts`].

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::consts::{
    DEFAULT_CELL_SIZE, DRAG_PUBLISH_INTERVAL_MS, DROP_TARGET_INTERVAL_MS, GRID_SIZE, HISTORY_MAX_DEPTH, PAGE_SIZE,
    REMOTE_DRAG_TTL_MS, SNAP_TOLERANCE_PX, WRITE_BATCH_MS,
};

/// Tuning knobs shared by every component of a board session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Coalescing window for the write queue.
    pub write_batch: Duration,
    /// Maximum number of undo entries retained.
    pub history_depth: usize,
    /// Spatial index cell side in world units.
    pub cell_size: f64,
    /// Minimum spacing between drop-target recomputations.
    pub drop_target_interval: Duration,
    /// Alignment-guide capture distance in screen pixels.
    pub snap_tolerance_px: f64,
    /// Grid pitch in world units.
    pub grid_size: f64,
    /// Minimum spacing between realtime drag publishes per object.
    pub drag_publish_interval: Duration,
    /// Lifetime of a remote drag preview without refresh.
    pub remote_drag_ttl: Duration,
    /// Page size for board hydration.
    pub page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_batch: Duration::from_millis(WRITE_BATCH_MS),
            history_depth: HISTORY_MAX_DEPTH,
            cell_size: DEFAULT_CELL_SIZE,
            drop_target_interval: Duration::from_millis(DROP_TARGET_INTERVAL_MS),
            snap_tolerance_px: SNAP_TOLERANCE_PX,
            grid_size: GRID_SIZE,
            drag_publish_interval: Duration::from_millis(DRAG_PUBLISH_INTERVAL_MS),
            remote_drag_ttl: Duration::from_millis(REMOTE_DRAG_TTL_MS),
            page_size: PAGE_SIZE,
        }
    }
}

impl SyncConfig {
    /// Build the config from the environment.
    ///
    /// Recognized variables:
    /// - `BOARDSYNC_WRITE_BATCH_MS`
    /// - `BOARDSYNC_HISTORY_DEPTH`
    /// - `BOARDSYNC_CELL_SIZE`
    /// - `BOARDSYNC_DROP_TARGET_INTERVAL_MS`
    /// - `BOARDSYNC_SNAP_TOLERANCE_PX`
    /// - `BOARDSYNC_GRID_SIZE`
    /// - `BOARDSYNC_DRAG_PUBLISH_MS`
    /// - `BOARDSYNC_REMOTE_DRAG_TTL_MS`
    /// - `BOARDSYNC_PAGE_SIZE`
    #[must_use]
    pub fn from_env() -> Self {
        let cell_size = env_parse("BOARDSYNC_CELL_SIZE", DEFAULT_CELL_SIZE);
        let grid_size = env_parse("BOARDSYNC_GRID_SIZE", GRID_SIZE);
        Self {
            write_batch: Duration::from_millis(env_parse("BOARDSYNC_WRITE_BATCH_MS", WRITE_BATCH_MS)),
            history_depth: env_parse("BOARDSYNC_HISTORY_DEPTH", HISTORY_MAX_DEPTH).max(1),
            cell_size: positive_or(cell_size, DEFAULT_CELL_SIZE),
            drop_target_interval: Duration::from_millis(env_parse(
                "BOARDSYNC_DROP_TARGET_INTERVAL_MS",
                DROP_TARGET_INTERVAL_MS,
            )),
            snap_tolerance_px: non_negative_or(
                env_parse("BOARDSYNC_SNAP_TOLERANCE_PX", SNAP_TOLERANCE_PX),
                SNAP_TOLERANCE_PX,
            ),
            grid_size: positive_or(grid_size, GRID_SIZE),
            drag_publish_interval: Duration::from_millis(env_parse("BOARDSYNC_DRAG_PUBLISH_MS", DRAG_PUBLISH_INTERVAL_MS)),
            remote_drag_ttl: Duration::from_millis(env_parse("BOARDSYNC_REMOTE_DRAG_TTL_MS", REMOTE_DRAG_TTL_MS)),
            page_size: env_parse("BOARDSYNC_PAGE_SIZE", PAGE_SIZE).max(1),
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when it is
/// missing or does not parse.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

// EDGE: `inf` and `NaN` parse as f64. A zero, negative or infinite pitch
// turns every snapped coordinate into NaN or divides by zero downstream.
fn positive_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { default }
}

fn non_negative_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value >= 0.0 { value } else { default }
}
