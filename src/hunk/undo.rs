use super::Hunk;
use serde::Serialize;
use std::collections::VecDeque;

/// A single-hunk review decision that can be undone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Accept,
    Reject,
}

/// The decision plus a value copy of the hunk as it was before the decision.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub action: ReviewAction,
    pub snapshot: Hunk,
}

/// Per-document LIFO history of review decisions, bounded to `capacity`
/// entries (oldest dropped first).
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        UndoStack {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, action: ReviewAction, hunk: &Hunk) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(UndoEntry {
            action,
            snapshot: hunk.clone(),
        });
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    /// Put an entry back on top, e.g. after a failed undo.
    pub fn restore(&mut self, entry: UndoEntry) {
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute;
    use crate::hunk::{create_from_diff, HunkStatus};

    fn one_hunk() -> Hunk {
        let old = vec!["a".to_string()];
        let new = vec!["b".to_string()];
        create_from_diff(compute(&old, &new), 0).remove(0)
    }

    #[test]
    fn lifo_order() {
        let mut stack = UndoStack::new(10);
        let h1 = one_hunk();
        let h2 = one_hunk();
        stack.push(ReviewAction::Accept, &h1);
        stack.push(ReviewAction::Reject, &h2);

        let top = stack.pop().unwrap();
        assert_eq!(top.action, ReviewAction::Reject);
        assert_eq!(top.snapshot.id, h2.id);
        assert_eq!(stack.pop().unwrap().snapshot.id, h1.id);
        assert!(stack.pop().is_none());
    }

    #[test]
    fn snapshot_is_not_affected_by_later_mutation() {
        let mut stack = UndoStack::new(10);
        let mut hunk = one_hunk();
        stack.push(ReviewAction::Accept, &hunk);
        hunk.accept();

        let entry = stack.pop().unwrap();
        assert_eq!(entry.snapshot.status, HunkStatus::Pending);
        assert_eq!(hunk.status, HunkStatus::Accepted);
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut stack = UndoStack::new(2);
        let hunks: Vec<Hunk> = (0..3).map(|_| one_hunk()).collect();
        for h in &hunks {
            stack.push(ReviewAction::Accept, h);
        }
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().unwrap().snapshot.id, hunks[2].id);
        assert_eq!(stack.pop().unwrap().snapshot.id, hunks[1].id);
        assert!(stack.is_empty());
    }
}
