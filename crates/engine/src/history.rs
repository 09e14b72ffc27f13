//! Undo/Redo history over cell edits.
//!
//! Only overlay writes are recorded. Row/column inserts and deletes are not
//! undoable; when they happen the recorded keys are remapped so the history
//! keeps addressing the same cells.

use std::collections::VecDeque;

use crate::overlay::{PatchKey, PatchOverlay};

/// One reversible overlay change. `None` means "absent from the overlay".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOp {
    pub key: PatchKey,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl PatchOp {
    pub fn is_noop(&self) -> bool {
        self.prev == self.next
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 10_000 }
    }
}

#[derive(Debug)]
pub struct UndoLog {
    undo_stack: VecDeque<PatchOp>,
    redo_stack: Vec<PatchOp>,
    max_entries: usize,
}

impl UndoLog {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_entries: config.max_entries.max(1),
        }
    }

    /// Record an applied op. No-ops are ignored.
    /// Returns true if the op was recorded (and redo cleared).
    pub fn record(&mut self, op: PatchOp) -> bool {
        if op.is_noop() {
            return false;
        }
        self.undo_stack.push_back(op);
        self.redo_stack.clear();

        // Limit history size
        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
        true
    }

    /// Revert the latest op on `overlay`. Returns the key it touched.
    pub fn undo(&mut self, overlay: &mut PatchOverlay) -> Option<PatchKey> {
        let op = self.undo_stack.pop_back()?;
        overlay.raw_set(op.key, op.prev.clone());
        let key = op.key;
        self.redo_stack.push(op);
        Some(key)
    }

    /// Re-apply the latest undone op on `overlay`.
    pub fn redo(&mut self, overlay: &mut PatchOverlay) -> Option<PatchKey> {
        let op = self.redo_stack.pop()?;
        overlay.raw_set(op.key, op.next.clone());
        let key = op.key;
        self.undo_stack.push_back(op);
        Some(key)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Follow a structural change. Ops whose key is dropped by `remap`
    /// are removed from both stacks.
    pub fn remap<F>(&mut self, remap: F)
    where
        F: Fn(PatchKey) -> Option<PatchKey>,
    {
        self.undo_stack.retain_mut(|op| match remap(op.key) {
            Some(key) => {
                op.key = key;
                true
            }
            None => false,
        });
        self.redo_stack.retain_mut(|op| match remap(op.key) {
            Some(key) => {
                op.key = key;
                true
            }
            None => false,
        });
    }
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}
