//! Simulation driver: seed a random board in memory, open a session on it,
//! drag a group around, undo and redo, and log how long each step took.
//!
//! `BOARDSYNC_SIM_OBJECTS` sets the board size (default 2000) and
//! `BOARDSYNC_SIM_SEED` the RNG seed. Engine tuning comes from the usual
//! `BOARDSYNC_*` variables.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use uuid::Uuid;

use boardsync::clock::SystemClock;
use boardsync::config::{SyncConfig, env_parse};
use boardsync::doc::{BoardObject, Shape};
use boardsync::engine::Session;
use boardsync::geometry::{Point, Rect};
use boardsync::hit;
use boardsync::repository::MemoryRepository;
use boardsync::sync::BoardFeed;

const WORLD_EXTENT: f64 = 10_000.0;
const FRAME_EVERY: usize = 50;
const DRAG_STEPS: u32 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let count: usize = env_parse("BOARDSYNC_SIM_OBJECTS", 2000);
    let seed: u64 = env_parse("BOARDSYNC_SIM_SEED", 7);
    let config = SyncConfig::from_env();
    let board_id = Uuid::new_v4();

    let repo = Arc::new(MemoryRepository::new());
    repo.seed(random_board(board_id, count, seed));

    let mut session = Session::new(board_id, repo.clone(), config, Arc::new(SystemClock))
        .with_user(Uuid::new_v4())
        .with_drag_channel(repo.clone());
    session.set_viewport(1600.0, 900.0);

    let started = Instant::now();
    let mut feed = BoardFeed::open(&mut session, repo.as_ref(), Some(repo.as_ref())).await?;
    info!(objects = session.doc().len(), elapsed_us = micros(started), "board opened");

    let started = Instant::now();
    let visible = session.visible_ids();
    info!(visible = visible.len(), elapsed_us = micros(started), "visible-set query");

    session.select_enclosed(Point::new(0.0, 0.0), Point::new(800.0, 450.0));
    let Some(bounds) = hit::selection_bounds(session.doc(), session.selection()) else {
        warn!("nothing enclosed in the top-left quadrant; try a larger BOARDSYNC_SIM_OBJECTS");
        return Ok(());
    };
    let grab = session.camera().world_to_screen(bounds.center());

    let started = Instant::now();
    if session.pointer_down(grab) {
        for step in 1..=DRAG_STEPS {
            let step = f64::from(step);
            session.pointer_move(grab.offset(step * 4.0, step * 2.0));
        }
        let release = grab.offset(f64::from(DRAG_STEPS) * 4.0, f64::from(DRAG_STEPS) * 2.0);
        let moved = session.pointer_up(release).map_or(0, |commit| commit.updates.len());
        info!(
            selected = session.selection().len(),
            moved,
            steps = DRAG_STEPS,
            elapsed_us = micros(started),
            "drag committed"
        );
    }

    let started = Instant::now();
    let undone = session.undo().map_or(0, |r| r.applied);
    let redone = session.redo().map_or(0, |r| r.applied);
    info!(undone, redone, elapsed_us = micros(started), "undo and redo replayed");

    session.flush_writes().await?;
    let echoed = feed.pump(&mut session).len();
    let failures = session.take_write_failures();
    info!(
        echoed,
        calls = repo.calls().len(),
        failures = failures.len(),
        redraws = session.tick().map_or(0, |r| r.ids.len()),
        "simulation finished"
    );
    Ok(())
}

fn random_board(board_id: Uuid, count: usize, seed: u64) -> Vec<BoardObject> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let (shape, size) = if i % FRAME_EVERY == 0 {
                (Shape::Frame { title: format!("Frame {i}") }, rng.random_range(400.0..1200.0))
            } else {
                let shape = match rng.random_range(0..4) {
                    0 => Shape::StickyNote { text: format!("note {i}") },
                    1 => Shape::Rect { text: String::new() },
                    2 => Shape::Ellipse { text: String::new() },
                    _ => Shape::Diamond { text: String::new() },
                };
                (shape, rng.random_range(20.0..160.0))
            };
            let rect = Rect::new(
                rng.random_range(0.0..WORLD_EXTENT),
                rng.random_range(0.0..WORLD_EXTENT),
                size,
                size * rng.random_range(0.5..1.5),
            );
            let mut obj = BoardObject::new(board_id, shape, rect);
            obj.z_index = i64::try_from(i).unwrap_or(i64::MAX);
            obj
        })
        .collect()
}

fn micros(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}
