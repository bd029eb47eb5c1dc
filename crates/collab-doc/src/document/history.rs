//! Linear undo history and compound-operation scoping.
//!
//! # Overview
//!
//! The history is a list of [`OperationRecord`]s and a cursor:
//!
//! - records in `[0, cursor)` are applied,
//! - records in `[cursor, len)` are undone but retained for redo.
//!
//! A compound operation is opened by the first `begin` and closed by the
//! matching outermost `end`; everything applied in between lands in a single
//! record. Undo replaces the record it consumed with the inverses it applied,
//! so a later redo is the very same step run again.

use tracing::debug;

use crate::event::{MutationEvent, UndoRedoStateChanged};

/// One undo/redo unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRecord {
    events: Vec<MutationEvent>,
}

impl OperationRecord {
    pub fn events(&self) -> &[MutationEvent] {
        &self.events
    }
}

/// What happens to applied events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Regular user edits; recorded.
    Recording,
    /// Seeding a fresh document; not undoable.
    Initializing,
    /// Undo/redo replay through the apply-only path; not recorded.
    Replaying,
}

#[derive(Debug)]
pub(crate) struct History {
    records: Vec<OperationRecord>,
    cursor: usize,
    depth: usize,
    mode: Mode,
    /// Events recorded by the open compound operation.
    scratch: Vec<MutationEvent>,
    /// Every event applied in the open scope, recorded or not.
    applied: Vec<MutationEvent>,
    /// Prefix of `applied` already announced through `ObjectChanged`.
    notified: usize,
    limit: usize,
}

impl History {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            cursor: 0,
            depth: 0,
            mode: Mode::Recording,
            scratch: Vec::new(),
            applied: Vec::new(),
            notified: 0,
            limit,
        }
    }

    pub(crate) fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub(crate) fn can_redo(&self) -> bool {
        self.cursor < self.records.len()
    }

    pub(crate) fn flags(&self) -> UndoRedoStateChanged {
        UndoRedoStateChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Switches mode and returns the previous one.
    pub(crate) fn set_mode(&mut self, mode: Mode) -> Mode {
        std::mem::replace(&mut self.mode, mode)
    }

    pub(crate) fn begin(&mut self) {
        self.depth += 1;
        if self.depth == 1 {
            self.scratch.clear();
            self.applied.clear();
            self.notified = 0;
        }
    }

    pub(crate) fn observe(&mut self, event: &MutationEvent) {
        self.applied.push(event.clone());
        if self.mode == Mode::Recording {
            self.scratch.push(event.clone());
        }
    }

    /// Applied events not yet announced, marking them announced.
    pub(crate) fn take_unnotified(&mut self) -> Vec<MutationEvent> {
        let pending = self.applied[self.notified..].to_vec();
        self.notified = self.applied.len();
        pending
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Closes the outermost scope. Returns the new flags when they flipped.
    pub(crate) fn commit(&mut self) -> Option<UndoRedoStateChanged> {
        let events = std::mem::take(&mut self.scratch);
        self.applied.clear();
        self.notified = 0;
        if self.mode != Mode::Recording || events.is_empty() {
            return None;
        }
        let before = self.flags();
        if self.cursor < self.records.len() {
            debug!(
                dropped = self.records.len() - self.cursor,
                "discarding redo branch"
            );
            self.records.truncate(self.cursor);
        }
        debug!(events = events.len(), position = self.cursor, "committing operation record");
        self.records.push(OperationRecord { events });
        self.cursor += 1;
        if self.limit > 0 && self.records.len() > self.limit {
            let excess = self.records.len() - self.limit;
            self.records.drain(..excess);
            self.cursor -= excess;
        }
        let after = self.flags();
        (before != after).then_some(after)
    }

    /// Steps the cursor back and hands out the record to invert.
    pub(crate) fn start_undo(&mut self) -> Option<(usize, Vec<MutationEvent>)> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        let events = std::mem::take(&mut self.records[self.cursor].events);
        Some((self.cursor, events))
    }

    /// Hands out the record at the cursor; the cursor moves in `finish_redo`.
    pub(crate) fn start_redo(&mut self) -> Option<(usize, Vec<MutationEvent>)> {
        if !self.can_redo() {
            return None;
        }
        let events = std::mem::take(&mut self.records[self.cursor].events);
        Some((self.cursor, events))
    }

    pub(crate) fn finish_redo(&mut self) {
        self.cursor += 1;
    }

    /// Stores the events a replay actually applied.
    pub(crate) fn store(&mut self, position: usize, events: Vec<MutationEvent>) {
        if let Some(record) = self.records.get_mut(position) {
            record.events = events;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.cursor = 0;
    }
}
