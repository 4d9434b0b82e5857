//! Command-log undo/redo.
//!
//! DESIGN
//! ======
//! Each user-initiated mutation becomes one [`HistoryEntry`]: an ordered
//! list of commands that carry enough before/after state to invert
//! themselves. Undo replays an entry's commands in reverse, inverting each;
//! redo replays them in original order from the saved "after" state.
//!
//! Replay is best-effort. A command whose target was deleted by another
//! participant fails on its own; the rest of the entry still runs.
//!
//! The service never touches the store directly. Callers hand in a
//! [`HistoryContext`], the small create/update/delete/list capability set.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::consts::HISTORY_MAX_DEPTH;
use crate::doc::{BoardObject, ObjectId, PartialBoardObject};
use crate::error::{ErrorCode, HistoryError};

/// One invertible mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create { after: BoardObject },
    Update { id: ObjectId, before: PartialBoardObject, after: PartialBoardObject },
    Delete { before: BoardObject },
}

impl Command {
    #[must_use]
    pub fn target(&self) -> ObjectId {
        match self {
            Self::Create { after } => after.id,
            Self::Update { id, .. } => *id,
            Self::Delete { before } => before.id,
        }
    }
}

/// Commands produced by one user action, in the order they were applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub label: String,
    pub commands: Vec<Command>,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), commands: Vec::new() }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Capabilities the history service needs from whoever owns the objects.
pub trait HistoryContext {
    /// Insert `obj`, replacing any record with the same id.
    ///
    /// # Errors
    ///
    /// Implementations may reject the record (validation).
    fn create(&mut self, obj: BoardObject) -> Result<(), HistoryError>;

    /// # Errors
    ///
    /// [`HistoryError::StaleTarget`] when `id` no longer exists.
    fn update(&mut self, id: ObjectId, fields: PartialBoardObject) -> Result<(), HistoryError>;

    /// # Errors
    ///
    /// [`HistoryError::StaleTarget`] when `id` no longer exists.
    fn delete(&mut self, id: ObjectId) -> Result<(), HistoryError>;

    /// Ids currently live.
    fn list(&self) -> Vec<ObjectId>;
}

/// Outcome of replaying one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub applied: usize,
    pub skipped: Vec<(ObjectId, HistoryError)>,
}

/// Replay `entry` backwards, inverting each command.
pub fn execute_undo(entry: &HistoryEntry, ctx: &mut dyn HistoryContext) -> ReplayReport {
    let mut live: HashSet<ObjectId> = ctx.list().into_iter().collect();
    let mut report = ReplayReport::default();
    for command in entry.commands.iter().rev() {
        let result = match command {
            Command::Create { after } => delete(ctx, &mut live, after.id),
            Command::Delete { before } => create(ctx, &mut live, before),
            Command::Update { id, before, .. } => update(ctx, &live, *id, before),
        };
        record(&mut report, command.target(), result, "undo");
    }
    report
}

/// Replay `entry` forwards from the saved "after" state.
pub fn execute_redo(entry: &HistoryEntry, ctx: &mut dyn HistoryContext) -> ReplayReport {
    let mut live: HashSet<ObjectId> = ctx.list().into_iter().collect();
    let mut report = ReplayReport::default();
    for command in &entry.commands {
        let result = match command {
            Command::Create { after } => create(ctx, &mut live, after),
            Command::Delete { before } => delete(ctx, &mut live, before.id),
            Command::Update { id, after, .. } => update(ctx, &live, *id, after),
        };
        record(&mut report, command.target(), result, "redo");
    }
    report
}

fn create(ctx: &mut dyn HistoryContext, live: &mut HashSet<ObjectId>, obj: &BoardObject) -> Result<(), HistoryError> {
    ctx.create(obj.clone())?;
    live.insert(obj.id);
    Ok(())
}

fn delete(ctx: &mut dyn HistoryContext, live: &mut HashSet<ObjectId>, id: ObjectId) -> Result<(), HistoryError> {
    require(live, id)?;
    ctx.delete(id)?;
    live.remove(&id);
    Ok(())
}

fn update(
    ctx: &mut dyn HistoryContext,
    live: &HashSet<ObjectId>,
    id: ObjectId,
    fields: &PartialBoardObject,
) -> Result<(), HistoryError> {
    require(live, id)?;
    ctx.update(id, fields.clone())
}

fn require(live: &HashSet<ObjectId>, id: ObjectId) -> Result<(), HistoryError> {
    if live.contains(&id) { Ok(()) } else { Err(HistoryError::StaleTarget(id)) }
}

fn record(report: &mut ReplayReport, id: ObjectId, result: Result<(), HistoryError>, op: &'static str) {
    match result {
        Ok(()) => report.applied += 1,
        Err(e) => {
            debug!(%id, op, code = e.error_code(), error = %e, "history: command skipped");
            report.skipped.push((id, e));
        }
    }
}

// =============================================================================
// STACKS
// =============================================================================

/// Bounded undo stack plus redo stack.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_depth(HISTORY_MAX_DEPTH)
    }
}

impl History {
    #[must_use]
    pub fn with_depth(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self { undo: VecDeque::with_capacity(max_depth), redo: Vec::new(), max_depth }
    }

    /// Record a completed action. Clears redo; drops the oldest entry past the cap.
    pub fn push(&mut self, entry: HistoryEntry) {
        if entry.is_empty() {
            return;
        }
        self.redo.clear();
        self.push_undo(entry);
    }

    /// Undo the most recent entry. `None` when there is nothing to undo.
    pub fn undo(&mut self, ctx: &mut dyn HistoryContext) -> Option<ReplayReport> {
        let entry = self.undo.pop_back()?;
        let report = execute_undo(&entry, ctx);
        self.redo.push(entry);
        Some(report)
    }

    /// Redo the most recently undone entry. `None` when there is nothing to redo.
    pub fn redo(&mut self, ctx: &mut dyn HistoryContext) -> Option<ReplayReport> {
        let entry = self.redo.pop()?;
        let report = execute_redo(&entry, ctx);
        self.push_undo(entry);
        Some(report)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Entry that `undo` would replay next.
    #[must_use]
    pub fn peek_undo(&self) -> Option<&HistoryEntry> {
        self.undo.back()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        while self.undo.len() > self.max_depth {
            self.undo.pop_front();
        }
    }
}
