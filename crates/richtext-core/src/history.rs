//! Bounded undo/redo history.
//!
//! History entries are serialized snapshots of the whole document, not
//! structural deltas: the tree is small (one editable surface), snapshots
//! make replacement trivially correct across arbitrary structural edits,
//! and the stack is capped, so memory stays bounded.
//!
//! Structural operations push the snapshot captured *before* the mutation,
//! with the selection bookmark embedded, so one undo visibly reverts the
//! operation and relocates the cursor. Debounced typing commits push the
//! snapshot captured *after* the burst; [`History::undo`] compensates by
//! skipping a popped entry that is identical to the live state, which keeps
//! "undo reverts what I can see" true for both push flavors.

use crate::bookmark::Bookmark;
use std::time::Instant;

/// Maximum number of undo entries retained; the oldest entry is evicted
/// beyond this.
pub const MAX_UNDO_ENTRIES: usize = 50;

/// One recorded document state.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Serialized tree, marker nodes included when a bookmark is carried.
    pub markup: String,
    /// Selection bookmark to relocate the cursor after applying `markup`.
    pub bookmark: Option<Bookmark>,
    /// When the entry was recorded.
    pub at: Instant,
}

/// Undo/redo stacks over serialized snapshots.
#[derive(Debug, Default)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
}

impl History {
    /// Create empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot.
    ///
    /// Pushing markup identical to the current top entry is a no-op. The
    /// oldest entry is evicted beyond [`MAX_UNDO_ENTRIES`]. Any effective
    /// push clears the redo stack.
    pub fn push(&mut self, markup: String, bookmark: Option<Bookmark>) {
        if self
            .undo_stack
            .last()
            .is_some_and(|top| top.markup == markup)
        {
            return;
        }
        if self.undo_stack.len() >= MAX_UNDO_ENTRIES {
            self.undo_stack.remove(0);
            log::debug!("history: evicted oldest entry at capacity");
        }
        self.undo_stack.push(HistoryEntry {
            markup,
            bookmark,
            at: Instant::now(),
        });
        self.redo_stack.clear();
    }

    /// Begin an undo: record `live` (the current serialized state, no
    /// bookmark) on the redo stack and return the entry to apply.
    ///
    /// When the popped entry matches `live` — the top was pushed by a
    /// post-state commit — the entry beneath it is returned instead, so a
    /// single undo always changes something when more state is available.
    /// Returns `None` when the undo stack is empty.
    pub fn undo(&mut self, live: String) -> Option<HistoryEntry> {
        if self.undo_stack.is_empty() {
            return None;
        }
        let mut entry = self.undo_stack.pop().expect("checked non-empty");
        if entry.markup == live && !self.undo_stack.is_empty() {
            entry = self.undo_stack.pop().expect("checked non-empty");
        }
        self.redo_stack.push(HistoryEntry {
            markup: live,
            bookmark: None,
            at: Instant::now(),
        });
        Some(entry)
    }

    /// Begin a redo: the mirror image of [`History::undo`].
    pub fn redo(&mut self, live: String) -> Option<HistoryEntry> {
        if self.redo_stack.is_empty() {
            return None;
        }
        let mut entry = self.redo_stack.pop().expect("checked non-empty");
        if entry.markup == live && !self.redo_stack.is_empty() {
            entry = self.redo_stack.pop().expect("checked non-empty");
        }
        self.undo_stack.push(HistoryEntry {
            markup: live,
            bookmark: None,
            at: Instant::now(),
        });
        Some(entry)
    }

    /// True when at least one undo entry exists.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// True when at least one redo entry exists.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo stack depth.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Redo stack depth.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop both stacks. Called around destructive owner-side operations
    /// that must not be undoable through this engine.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_n(history: &mut History, n: usize) {
        for i in 0..n {
            history.push(format!("state-{i}"), None);
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new();
        push_n(&mut history, 51);
        assert_eq!(history.undo_depth(), MAX_UNDO_ENTRIES);
        // state-0 was evicted; the bottom of the stack is state-1.
        let bottom = history
            .undo_stack
            .first()
            .map(|e| e.markup.clone())
            .unwrap();
        assert_eq!(bottom, "state-1");
    }

    #[test]
    fn test_push_identical_to_top_is_noop() {
        let mut history = History::new();
        history.push("same".to_string(), None);
        history.push("same".to_string(), None);
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = History::new();
        push_n(&mut history, 3);
        history.undo("live".to_string());
        assert!(history.can_redo());
        history.push("new-state".to_string(), None);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_empty_is_noop() {
        let mut history = History::new();
        assert!(history.undo("live".to_string()).is_none());
        assert!(history.redo("live".to_string()).is_none());
    }

    #[test]
    fn test_undo_skips_entry_matching_live() {
        let mut history = History::new();
        history.push("a".to_string(), None);
        history.push("b".to_string(), None);
        // Live state equals the top entry (post-state push): one undo must
        // still land on "a".
        let entry = history.undo("b".to_string()).unwrap();
        assert_eq!(entry.markup, "a");
        // Redo returns to "b".
        let entry = history.redo("a".to_string()).unwrap();
        assert_eq!(entry.markup, "b");
    }

    #[test]
    fn test_undo_applies_top_when_it_differs() {
        let mut history = History::new();
        history.push("before".to_string(), None);
        let entry = history.undo("after".to_string()).unwrap();
        assert_eq!(entry.markup, "before");
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }
}
