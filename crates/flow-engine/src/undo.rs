//! Undo/redo as a linear stack of command pairs
//!
//! Each entry stores the forward command and its inverse, both carrying the
//! arguments captured when the action was performed. The stack does not run
//! commands itself: `undo`/`redo` hand the command back and the owner replays
//! it while the stack is locked, so the replay is not recorded again.

use std::collections::VecDeque;

/// One recorded action
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<C> {
    pub exec: C,
    pub undo: C,
}

/// Undo/redo stack of command pairs
#[derive(Debug, Clone)]
pub struct History<C> {
    entries: VecDeque<Entry<C>>,
    /// Number of entries currently applied
    position: usize,
    /// Lock depth; `add` is ignored while non-zero
    locked: usize,
    /// Maximum number of entries, 0 for unlimited
    limit: usize,
}

impl<C: Clone> History<C> {
    /// Create a stack keeping at most `limit` entries (0 = unlimited)
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            position: 0,
            locked: 0,
            limit,
        }
    }

    /// Record an action
    ///
    /// Discards any redo branch. Ignored while locked.
    pub fn add(&mut self, exec: C, undo: C) {
        if self.is_locked() {
            return;
        }

        self.entries.truncate(self.position);
        self.entries.push_back(Entry { exec, undo });
        self.position = self.entries.len();

        while self.limit > 0 && self.entries.len() > self.limit {
            self.entries.pop_front();
            self.position -= 1;
        }
    }

    /// Step back, returning the inverse command to replay
    pub fn undo(&mut self) -> Option<C> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        self.entries.get(self.position).map(|e| e.undo.clone())
    }

    /// Step forward, returning the forward command to replay
    pub fn redo(&mut self) -> Option<C> {
        let command = self.entries.get(self.position).map(|e| e.exec.clone())?;
        self.position += 1;
        Some(command)
    }

    pub fn lock(&mut self) {
        self.locked += 1;
    }

    pub fn unlock(&mut self) {
        self.locked = self.locked.saturating_sub(1);
    }

    pub fn is_locked(&self) -> bool {
        self.locked > 0
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.position = 0;
    }
}

impl<C: Clone> Default for History<C> {
    fn default() -> Self {
        Self::new(0)
    }
}
