//! Board loading and the live feed from the repository.
//!
//! DESIGN
//! ======
//! Opening a board is three steps: page through the snapshot, load it into
//! the session, then subscribe to deltas after the snapshot's sequence
//! number. Because the subscription replays everything after that sequence,
//! nothing written between the fetch and the subscribe is lost; anything
//! delivered twice is skipped by sequence and would be harmless anyway,
//! since changesets apply idempotently.
//!
//! [`BoardFeed`] owns the receivers. Hosts either `pump` it once per frame
//! (non-blocking) or `await` [`BoardFeed::next`] in a `select!` loop of
//! their own.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::doc::{BoardObject, ChangeSummary, ObjectId};
use crate::engine::Session;
use crate::error::RepositoryError;
use crate::repository::{Delta, DragChannel, DragUpdate, ObjectRepository};

// =============================================================================
// HYDRATION
// =============================================================================

/// Every object on a board plus the sequence the read started at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub objects: Vec<BoardObject>,
    pub seq: u64,
}

/// Fetch a whole board, `page_size` objects at a time.
///
/// The returned `seq` is the first page's, so resuming from it covers any
/// write that landed while later pages were being read.
///
/// # Errors
///
/// The first repository error encountered.
pub async fn hydrate_board(
    repo: &dyn ObjectRepository,
    board_id: Uuid,
    page_size: usize,
) -> Result<Snapshot, RepositoryError> {
    let limit = page_size.max(1);
    let mut objects = Vec::new();
    let mut cursor = None;
    let mut seq = None;
    let mut pages = 0usize;

    loop {
        let page = repo.fetch_objects_paginated(board_id, cursor, limit).await?;
        pages += 1;
        seq.get_or_insert(page.seq);
        objects.extend(page.objects);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(%board_id, count = objects.len(), pages, "sync: board hydrated");
    Ok(Snapshot { objects, seq: seq.unwrap_or_default() })
}

// =============================================================================
// FEED
// =============================================================================

/// What one incoming message did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Applied { seq: u64, summary: ChangeSummary },
    /// The changeset failed validation; nothing was applied.
    Rejected { seq: u64 },
    /// Already seen.
    Duplicate { seq: u64 },
    /// A realtime drag position; `kept` is false for our own echoes and
    /// objects we do not know.
    Drag { id: ObjectId, kept: bool },
}

enum Incoming {
    Delta(Option<Delta>),
    Drag(Option<DragUpdate>),
}

/// Live delta and drag receivers for the session's current board.
#[derive(Debug)]
pub struct BoardFeed {
    board_id: Uuid,
    deltas: mpsc::UnboundedReceiver<Delta>,
    drags: Option<mpsc::UnboundedReceiver<DragUpdate>>,
    last_seq: u64,
}

impl BoardFeed {
    /// Hydrate `session`'s board and subscribe to everything after it.
    ///
    /// # Errors
    ///
    /// Repository errors from the fetch or either subscription.
    pub async fn open(
        session: &mut Session,
        repo: &dyn ObjectRepository,
        channel: Option<&dyn DragChannel>,
    ) -> Result<Self, RepositoryError> {
        let board_id = session.board_id();
        let snapshot = hydrate_board(repo, board_id, session.config().page_size).await?;
        let deltas = repo.subscribe_to_delta_updates(board_id, snapshot.seq).await?;
        let drags = match channel {
            Some(channel) => Some(channel.subscribe_to_drag_updates(board_id).await?),
            None => None,
        };
        session.load_snapshot(snapshot.objects);
        Ok(Self { board_id, deltas, drags, last_seq: snapshot.seq })
    }

    #[must_use]
    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    /// Highest sequence applied (or skipped as invalid) so far.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Apply everything already waiting, without blocking.
    pub fn pump(&mut self, session: &mut Session) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        while let Ok(delta) = self.deltas.try_recv() {
            events.push(self.apply_delta(session, delta));
        }
        if let Some(drags) = &mut self.drags {
            while let Ok(update) = drags.try_recv() {
                events.push(FeedEvent::Drag { id: update.object_id, kept: session.apply_remote_drag(&update) });
            }
        }
        events
    }

    /// Wait for the next message and apply it. `None` once the delta stream closes.
    pub async fn next(&mut self, session: &mut Session) -> Option<FeedEvent> {
        loop {
            let incoming = {
                let drags = &mut self.drags;
                tokio::select! {
                    delta = self.deltas.recv() => Incoming::Delta(delta),
                    update = recv_drag(drags) => Incoming::Drag(update),
                }
            };
            match incoming {
                Incoming::Delta(Some(delta)) => return Some(self.apply_delta(session, delta)),
                Incoming::Delta(None) => {
                    info!(board_id = %self.board_id, last_seq = self.last_seq, "sync: delta stream closed");
                    return None;
                }
                Incoming::Drag(Some(update)) => {
                    let kept = session.apply_remote_drag(&update);
                    return Some(FeedEvent::Drag { id: update.object_id, kept });
                }
                Incoming::Drag(None) => {
                    debug!(board_id = %self.board_id, "sync: drag stream closed");
                    self.drags = None;
                }
            }
        }
    }

    fn apply_delta(&mut self, session: &mut Session, delta: Delta) -> FeedEvent {
        let seq = delta.seq;
        if seq <= self.last_seq {
            debug!(seq, last_seq = self.last_seq, "sync: duplicate delta");
            return FeedEvent::Duplicate { seq };
        }
        // A malformed delta never becomes valid, so it is consumed either way.
        self.last_seq = seq;
        match session.apply_remote_changeset(&delta.changeset) {
            Ok(summary) => FeedEvent::Applied { seq, summary },
            Err(_) => FeedEvent::Rejected { seq },
        }
    }
}

async fn recv_drag(rx: &mut Option<mpsc::UnboundedReceiver<DragUpdate>>) -> Option<DragUpdate> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
