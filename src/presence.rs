//! Throttled publishing of in-progress drag positions.
//!
//! DESIGN
//! ======
//! Pointer-move fires far more often than anyone needs to see a remote
//! cursor move. [`DragThrottle`] lets one update per object through per
//! interval and parks the newest of the rest; the parked update goes out
//! once the interval has elapsed, so a pointer that stops moving still
//! shows its final position to the other participants.
//!
//! Publishing is best-effort. Failures are logged at debug and dropped;
//! the durable commit at drag end is what other clients converge on.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::doc::ObjectId;
use crate::error::ErrorCode;
use crate::repository::{DragChannel, DragUpdate};

// =============================================================================
// THROTTLE
// =============================================================================

/// Per-object leading-edge throttle with a trailing update.
#[derive(Debug, Clone)]
pub struct DragThrottle {
    interval: Duration,
    last_sent: HashMap<ObjectId, Instant>,
    parked: HashMap<ObjectId, DragUpdate>,
}

impl DragThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_sent: HashMap::new(), parked: HashMap::new() }
    }

    /// Returns the update if it may go out now; otherwise parks it.
    pub fn offer(&mut self, update: DragUpdate, now: Instant) -> Option<DragUpdate> {
        let id = update.object_id;
        if self.is_due(&id, now) {
            self.last_sent.insert(id, now);
            self.parked.remove(&id);
            Some(update)
        } else {
            self.parked.insert(id, update);
            None
        }
    }

    /// Parked updates whose interval has elapsed, now marked as sent.
    pub fn take_due(&mut self, now: Instant) -> Vec<DragUpdate> {
        let due: Vec<ObjectId> = self.parked.keys().filter(|id| self.is_due(id, now)).copied().collect();
        due.into_iter()
            .filter_map(|id| {
                self.last_sent.insert(id, now);
                self.parked.remove(&id)
            })
            .collect()
    }

    /// Drop throttle state for an object whose gesture ended.
    pub fn forget(&mut self, id: &ObjectId) {
        self.last_sent.remove(id);
        self.parked.remove(id);
    }

    #[must_use]
    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    fn is_due(&self, id: &ObjectId, now: Instant) -> bool {
        self.last_sent
            .get(id)
            .is_none_or(|sent| now.saturating_duration_since(*sent) >= self.interval)
    }
}

// =============================================================================
// WORKER
// =============================================================================

#[derive(Debug)]
enum PresenceMsg {
    Moved(DragUpdate),
    Ended(ObjectId),
}

/// Handle for the drag-publisher worker.
#[derive(Debug, Clone)]
pub struct DragPublisher {
    tx: mpsc::UnboundedSender<PresenceMsg>,
}

impl DragPublisher {
    /// Queue a position. Returns false if the worker is gone.
    pub fn publish(&self, update: DragUpdate) -> bool {
        self.tx.send(PresenceMsg::Moved(update)).is_ok()
    }

    /// The object's gesture is over; flush nothing further for it.
    pub fn end(&self, id: ObjectId) -> bool {
        self.tx.send(PresenceMsg::Ended(id)).is_ok()
    }
}

/// Spawn the drag-publisher worker. It stops when every handle is dropped.
#[must_use]
pub fn spawn_drag_publisher(channel: Arc<dyn DragChannel>, interval: Duration) -> DragPublisher {
    let (tx, mut rx) = mpsc::unbounded_channel::<PresenceMsg>();
    let interval = interval.max(Duration::from_millis(1));
    info!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "drag publisher configured");

    tokio::spawn(async move {
        let mut throttle = DragThrottle::new(interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_msg = rx.recv() => {
                    let now = tokio::time::Instant::now().into_std();
                    match maybe_msg {
                        Some(PresenceMsg::Moved(update)) => {
                            if let Some(update) = throttle.offer(update, now) {
                                send(channel.as_ref(), update).await;
                            }
                        }
                        Some(PresenceMsg::Ended(id)) => throttle.forget(&id),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    let now = tokio::time::Instant::now().into_std();
                    for update in throttle.take_due(now) {
                        send(channel.as_ref(), update).await;
                    }
                }
            }
        }
        debug!("drag publisher stopped");
    });

    DragPublisher { tx }
}

async fn send(channel: &dyn DragChannel, update: DragUpdate) {
    if let Err(e) = channel.publish_drag_update(update).await {
        debug!(object_id = %update.object_id, code = e.error_code(), error = %e, "drag publish dropped");
    }
}
