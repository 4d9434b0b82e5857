#![allow(clippy::float_cmp)]

use super::*;

// =============================================================
// env_parse
// =============================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__BOARDSYNC_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__BOARDSYNC_TEST_VALID__", " 99 ") };
    let val: u64 = env_parse("__BOARDSYNC_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__BOARDSYNC_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__BOARDSYNC_TEST_INVALID__", "lots") };
    let val: f64 = env_parse("__BOARDSYNC_TEST_INVALID__", 7.5);
    assert_eq!(val, 7.5);
    unsafe { std::env::remove_var("__BOARDSYNC_TEST_INVALID__") };
}

// =============================================================
// SyncConfig
// =============================================================

#[test]
fn default_matches_constants() {
    let config = SyncConfig::default();
    assert_eq!(config.write_batch, Duration::from_millis(WRITE_BATCH_MS));
    assert_eq!(config.history_depth, HISTORY_MAX_DEPTH);
    assert_eq!(config.cell_size, DEFAULT_CELL_SIZE);
    assert_eq!(config.drop_target_interval, Duration::from_millis(DROP_TARGET_INTERVAL_MS));
    assert_eq!(config.grid_size, GRID_SIZE);
    assert_eq!(config.page_size, PAGE_SIZE);
}

#[test]
fn history_depth_default_is_fifty() {
    assert_eq!(SyncConfig::default().history_depth, 50);
}

// =============================================================
// Float sanitising
// =============================================================

#[test]
fn pitch_must_be_positive_and_finite() {
    assert_eq!(positive_or(25.0, GRID_SIZE), 25.0);
    assert_eq!(positive_or(0.0, GRID_SIZE), GRID_SIZE);
    assert_eq!(positive_or(-4.0, GRID_SIZE), GRID_SIZE);
    assert_eq!(positive_or(f64::INFINITY, GRID_SIZE), GRID_SIZE);
    assert_eq!(positive_or(f64::NAN, GRID_SIZE), GRID_SIZE);
}

#[test]
fn tolerance_may_be_zero_but_not_infinite() {
    assert_eq!(non_negative_or(0.0, SNAP_TOLERANCE_PX), 0.0);
    assert_eq!(non_negative_or(f64::INFINITY, SNAP_TOLERANCE_PX), SNAP_TOLERANCE_PX);
    assert_eq!(non_negative_or(f64::NAN, SNAP_TOLERANCE_PX), SNAP_TOLERANCE_PX);
    assert_eq!(non_negative_or(-1.0, SNAP_TOLERANCE_PX), SNAP_TOLERANCE_PX);
}

#[test]
fn infinite_grid_from_env_falls_back() {
    unsafe { std::env::set_var("BOARDSYNC_GRID_SIZE", "inf") };
    let grid = SyncConfig::from_env().grid_size;
    unsafe { std::env::remove_var("BOARDSYNC_GRID_SIZE") };
    assert_eq!(grid, GRID_SIZE);
}
