mod apply;
mod undo;

pub use apply::{apply, revert, BufferEditor, DocumentEditor, FileEditor, LineEdit};
pub use undo::{ReviewAction, UndoEntry, UndoStack};

use crate::diff::{ChangeKind, ChangeRecord};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};

static HUNK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique hunk identifier. Ids only ever grow and are never reused.
pub type HunkId = u64;

fn next_hunk_id() -> HunkId {
    HUNK_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Review decision for a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A change record with an identity and a review status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    pub id: HunkId,
    #[serde(flatten)]
    pub change: ChangeRecord,
    pub status: HunkStatus,
    /// Context lines requested when the hunk was created (display only)
    pub context: usize,
}

impl Hunk {
    pub fn kind(&self) -> ChangeKind {
        self.change.kind
    }

    pub fn is_pending(&self) -> bool {
        self.status == HunkStatus::Pending
    }

    pub fn accept(&mut self) {
        self.status = HunkStatus::Accepted;
    }

    pub fn reject(&mut self) {
        self.status = HunkStatus::Rejected;
    }
}

/// Promote diff output to pending hunks, keeping the diff's order.
pub fn create_from_diff(changes: Vec<ChangeRecord>, context: usize) -> Vec<Hunk> {
    changes
        .into_iter()
        .map(|change| Hunk {
            id: next_hunk_id(),
            change,
            status: HunkStatus::Pending,
            context,
        })
        .collect()
}

/// Lines (1-indexed, inclusive) a hunk occupies for navigation and hit-testing.
///
/// Adds and changes cover their new lines; a delete is anchored on the single
/// line `old_start`.
pub fn range_of(hunk: &Hunk) -> RangeInclusive<usize> {
    let c = &hunk.change;
    match c.kind {
        ChangeKind::Add | ChangeKind::Change => {
            let end = c.new_start + c.new_count.saturating_sub(1);
            c.new_start..=end
        }
        ChangeKind::Delete => c.old_start..=c.old_start,
    }
}

/// `range_of` widened by the hunk's context lines, never before line 1.
pub fn display_range(hunk: &Hunk) -> RangeInclusive<usize> {
    let range = range_of(hunk);
    let start = range.start().saturating_sub(hunk.context).max(1);
    start..=range.end() + hunk.context
}

/// The hunk whose range contains `line`
pub fn hunk_at(hunks: &[Hunk], line: usize) -> Option<&Hunk> {
    hunks.iter().find(|h| range_of(h).contains(&line))
}

/// Nearest hunk starting strictly after `line`, wrapping to the first one.
pub fn next(hunks: &[Hunk], line: usize) -> Option<&Hunk> {
    hunks
        .iter()
        .filter(|h| *range_of(h).start() > line)
        .min_by_key(|h| *range_of(h).start())
        .or_else(|| hunks.iter().min_by_key(|h| *range_of(h).start()))
}

/// Nearest hunk starting strictly before `line`, wrapping to the last one.
pub fn prev(hunks: &[Hunk], line: usize) -> Option<&Hunk> {
    hunks
        .iter()
        .filter(|h| *range_of(h).start() < line)
        .max_by_key(|h| *range_of(h).start())
        .or_else(|| hunks.iter().max_by_key(|h| *range_of(h).start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Three hunks: change at line 2, add at line 5, delete anchored at old line 7.
    fn sample() -> Vec<Hunk> {
        let old = lines(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let new = lines(&["a", "B", "c", "d", "new", "e", "f", "h"]);
        create_from_diff(compute(&old, &new), 0)
    }

    #[test]
    fn create_assigns_pending_and_increasing_ids() {
        let hunks = sample();
        assert_eq!(hunks.len(), 3);
        assert!(hunks.iter().all(|h| h.is_pending()));
        assert!(hunks.windows(2).all(|w| w[0].id < w[1].id));

        let later = sample();
        assert!(later[0].id > hunks[2].id);
    }

    #[test]
    fn ids_are_never_reused_after_drop() {
        let first = sample();
        let max_seen = first.iter().map(|h| h.id).max().unwrap();
        drop(first);
        let second = sample();
        assert!(second.iter().all(|h| h.id > max_seen));
    }

    #[test]
    fn range_of_each_kind() {
        let hunks = sample();
        assert_eq!(hunks[0].kind(), ChangeKind::Change);
        assert_eq!(range_of(&hunks[0]), 2..=2);
        assert_eq!(hunks[1].kind(), ChangeKind::Add);
        assert_eq!(range_of(&hunks[1]), 5..=5);
        assert_eq!(hunks[2].kind(), ChangeKind::Delete);
        assert_eq!(range_of(&hunks[2]), 7..=7);
    }

    #[test]
    fn display_range_clamps_at_first_line() {
        let hunks = create_from_diff(compute(&lines(&["a", "b"]), &lines(&["A", "b"])), 3);
        assert_eq!(display_range(&hunks[0]), 1..=4);
    }

    #[test]
    fn hunk_at_position() {
        let hunks = sample();
        assert_eq!(hunk_at(&hunks, 2).map(|h| h.id), Some(hunks[0].id));
        assert_eq!(hunk_at(&hunks, 7).map(|h| h.id), Some(hunks[2].id));
        assert!(hunk_at(&hunks, 3).is_none());
    }

    #[test]
    fn next_and_prev_wrap() {
        let hunks = sample();
        assert_eq!(next(&hunks, 1).map(|h| h.id), Some(hunks[0].id));
        assert_eq!(next(&hunks, 2).map(|h| h.id), Some(hunks[1].id));
        assert_eq!(next(&hunks, 7).map(|h| h.id), Some(hunks[0].id));
        assert_eq!(prev(&hunks, 5).map(|h| h.id), Some(hunks[0].id));
        assert_eq!(prev(&hunks, 2).map(|h| h.id), Some(hunks[2].id));
        assert_eq!(prev(&hunks, 100).map(|h| h.id), Some(hunks[2].id));
    }

    #[test]
    fn queries_on_empty_list() {
        assert!(next(&[], 1).is_none());
        assert!(prev(&[], 1).is_none());
        assert!(hunk_at(&[], 1).is_none());
    }
}
