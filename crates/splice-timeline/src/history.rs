//! Snapshot-based undo/redo history.
//!
//! Edits already produce whole new timelines, so history keeps the
//! timeline as it was *before* each edit:
//! - pushing a new entry clears the redo stack
//! - batch mode collapses a drag's many frames into one entry
//! - a maximum depth bounds memory

use crate::timeline::Timeline;
use std::collections::VecDeque;

/// A single entry in the undo/redo history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Human-readable label (e.g., "move", "split").
    pub label: String,
    pub snapshot: Timeline,
}

/// Snapshot undo/redo with a bounded depth.
#[derive(Debug)]
pub struct History {
    /// Oldest entry at the front.
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    max_depth: usize,
    /// Label and "before" snapshot of the open batch.
    batch: Option<HistoryEntry>,
}

impl History {
    /// Create a new history with the given maximum depth.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_depth: max_depth.max(1),
            batch: None,
        }
    }

    /// Record the state from before an edit. Suppressed during a batch.
    pub fn push(&mut self, label: impl Into<String>, before: Timeline) {
        if self.batch.is_some() {
            return;
        }
        self.record(HistoryEntry {
            label: label.into(),
            snapshot: before,
        });
    }

    fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push_back(entry);
        if self.undo.len() > self.max_depth {
            self.undo.pop_front();
        }
    }

    /// Open a batch; `before` is restored by a single undo.
    pub fn begin_batch(&mut self, label: impl Into<String>, before: Timeline) {
        if self.batch.is_none() {
            self.batch = Some(HistoryEntry {
                label: label.into(),
                snapshot: before,
            });
        }
    }

    /// Close the batch. Records it only if the state actually changed.
    pub fn end_batch(&mut self, after: &Timeline) {
        if let Some(entry) = self.batch.take() {
            if entry.snapshot != *after {
                self.record(entry);
            }
        }
    }

    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    /// Step back. `current` becomes redoable; returns the state to restore.
    pub fn undo(&mut self, current: Timeline) -> Option<Timeline> {
        let entry = self.undo.pop_back()?;
        self.redo.push(HistoryEntry {
            label: entry.label.clone(),
            snapshot: current,
        });
        Some(entry.snapshot)
    }

    /// Step forward again. Returns the state to restore.
    pub fn redo(&mut self, current: Timeline) -> Option<Timeline> {
        let entry = self.redo.pop()?;
        self.undo.push_back(HistoryEntry {
            label: entry.label.clone(),
            snapshot: current,
        });
        Some(entry.snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Label of the step `undo` would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.back().map(|e| e.label.as_str())
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.batch = None;
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(splice_core::defaults::HISTORY_DEPTH)
    }
}
