mod myers;
mod words;

pub use myers::{edit_script, Edit};
pub use words::{compute_words, WordChange};

use serde::Serialize;

/// An ordered sequence of text lines. Line numbers exposed by this crate are
/// 1-indexed into such a sequence.
pub type LineSequence = Vec<String>;

/// What a change record does to the old side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Delete,
    Change,
}

impl ChangeKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeKind::Add => "+",
            ChangeKind::Delete => "-",
            ChangeKind::Change => "~",
        }
    }
}

/// One contiguous group of changed lines between two versions of a document.
///
/// `old_start - 1` old lines and `new_start - 1` new lines precede the
/// record, whatever its kind: a pure add inserts before old line `old_start`,
/// a pure delete removes lines that sat before new line `new_start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
}

impl ChangeRecord {
    /// Net number of lines this record adds to the document
    pub fn line_delta(&self) -> isize {
        self.new_count as isize - self.old_count as isize
    }

    /// Unified-diff style header, e.g. `@@ -3,2 +3,4 @@`
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Diff two line sequences into grouped change records, in ascending order.
pub fn compute(old: &[String], new: &[String]) -> Vec<ChangeRecord> {
    let script = edit_script(old, new);
    group(&script, old, new)
}

/// Replay `records` (as produced by [`compute`] against `old`, or any
/// ordered subset of them) on top of `old`.
pub fn patch(old: &[String], records: &[ChangeRecord]) -> LineSequence {
    let mut out = Vec::with_capacity(old.len());
    let mut cursor = 0;

    for record in records {
        let start = record.old_start.saturating_sub(1).clamp(cursor, old.len());
        out.extend_from_slice(&old[cursor..start]);
        out.extend(record.new_lines.iter().cloned());
        cursor = (start + record.old_count).min(old.len());
    }
    out.extend_from_slice(&old[cursor..]);
    out
}

/// Lines under construction between two `Equal` boundaries
struct OpenGroup {
    old_start: usize,
    new_start: usize,
    old_lines: Vec<String>,
    new_lines: Vec<String>,
}

impl OpenGroup {
    fn open(old_index: usize, new_index: usize) -> Self {
        OpenGroup {
            old_start: old_index + 1,
            new_start: new_index + 1,
            old_lines: Vec::new(),
            new_lines: Vec::new(),
        }
    }

    fn close(self) -> ChangeRecord {
        let kind = match (self.old_lines.is_empty(), self.new_lines.is_empty()) {
            (false, false) => ChangeKind::Change,
            (false, true) => ChangeKind::Delete,
            _ => ChangeKind::Add,
        };
        ChangeRecord {
            kind,
            old_start: self.old_start,
            old_count: self.old_lines.len(),
            new_start: self.new_start,
            new_count: self.new_lines.len(),
            old_lines: self.old_lines,
            new_lines: self.new_lines,
        }
    }
}

/// Coalesce an edit script into records. Only deletes and inserts with no
/// `Equal` between them end up in the same record.
fn group(script: &[Edit], old: &[String], new: &[String]) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    let mut current: Option<OpenGroup> = None;
    let (mut oi, mut ni) = (0, 0);

    for edit in script {
        match edit {
            Edit::Equal => {
                if let Some(open) = current.take() {
                    records.push(open.close());
                }
                oi += 1;
                ni += 1;
            }
            Edit::Delete => {
                current
                    .get_or_insert_with(|| OpenGroup::open(oi, ni))
                    .old_lines
                    .push(old[oi].clone());
                oi += 1;
            }
            Edit::Insert => {
                current
                    .get_or_insert_with(|| OpenGroup::open(oi, ni))
                    .new_lines
                    .push(new[ni].clone());
                ni += 1;
            }
        }
    }
    if let Some(open) = current {
        records.push(open.close());
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_sequences_have_no_records() {
        let a = lines(&["a", "b", "c"]);
        assert!(compute(&a, &a).is_empty());
        assert!(compute(&[], &[]).is_empty());
    }

    #[test]
    fn single_line_change() {
        let records = compute(&lines(&["a", "b", "c"]), &lines(&["a", "X", "c"]));
        assert_eq!(
            records,
            vec![ChangeRecord {
                kind: ChangeKind::Change,
                old_start: 2,
                old_count: 1,
                new_start: 2,
                new_count: 1,
                old_lines: lines(&["b"]),
                new_lines: lines(&["X"]),
            }]
        );
    }

    #[test]
    fn single_line_add() {
        let records = compute(&lines(&["a", "c"]), &lines(&["a", "b", "c"]));
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.kind, ChangeKind::Add);
        assert_eq!((r.new_start, r.new_count), (2, 1));
        assert_eq!((r.old_start, r.old_count), (2, 0));
        assert_eq!(r.new_lines, lines(&["b"]));
        assert!(r.old_lines.is_empty());
    }

    #[test]
    fn empty_old_is_one_add() {
        let new = lines(&["x", "y", "z"]);
        let records = compute(&[], &new);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ChangeKind::Add);
        assert_eq!((records[0].new_start, records[0].new_count), (1, 3));
        assert_eq!(records[0].new_lines, new);
    }

    #[test]
    fn empty_new_is_one_delete() {
        let old = lines(&["x", "y"]);
        let records = compute(&old, &[]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ChangeKind::Delete);
        assert_eq!((records[0].old_start, records[0].old_count), (1, 2));
        assert_eq!(records[0].new_count, 0);
        assert_eq!(records[0].old_lines, old);
    }

    #[test]
    fn trailing_delete_positions() {
        let records = compute(&lines(&["a", "b", "c"]), &lines(&["a"]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ChangeKind::Delete);
        assert_eq!((records[0].old_start, records[0].old_count), (2, 2));
        assert_eq!(records[0].new_start, 2);
    }

    #[test]
    fn separated_edits_stay_separate() {
        let old = lines(&["1", "2", "3", "4", "5"]);
        let new = lines(&["1", "two", "3", "5", "6"]);
        let records = compute(&old, &new);
        let kinds: Vec<ChangeKind> = records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Change, ChangeKind::Delete, ChangeKind::Add]
        );
        // ascending, non-overlapping
        for pair in records.windows(2) {
            assert!(pair[0].old_start + pair[0].old_count <= pair[1].old_start);
            assert!(pair[0].new_start + pair[0].new_count <= pair[1].new_start);
        }
    }

    #[test]
    fn counts_match_line_vectors() {
        let old = lines(&["a", "b", "c", "d", "e", "f"]);
        let new = lines(&["a", "c", "c2", "d", "x", "y", "f", "g"]);
        for r in compute(&old, &new) {
            assert_eq!(r.old_count, r.old_lines.len());
            assert_eq!(r.new_count, r.new_lines.len());
        }
    }

    #[test]
    fn patch_reproduces_new_side() {
        let cases: Vec<(Vec<String>, Vec<String>)> = vec![
            (lines(&["a", "b", "c"]), lines(&["a", "X", "c"])),
            (lines(&[]), lines(&["only"])),
            (lines(&["gone", "too"]), lines(&[])),
            (
                lines(&["use std::io;", "", "fn main() {", "    run();", "}"]),
                lines(&["use std::fs;", "use std::io;", "fn main() {", "    setup();", "    run();", "}", ""]),
            ),
            (
                lines(&["a", "b", "a", "b", "a"]),
                lines(&["b", "a", "b", "a", "b"]),
            ),
        ];
        for (old, new) in cases {
            let records = compute(&old, &new);
            assert_eq!(patch(&old, &records), new);
        }
    }

    /// Deterministic xorshift64 so generated cases are reproducible.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: u64) -> usize {
            (self.next() % n) as usize
        }

        /// Short sequence over a tiny alphabet, so repeats are common.
        fn sequence(&mut self) -> Vec<String> {
            let len = self.below(9);
            (0..len).map(|_| ["a", "b", "c"][self.below(3)].to_string()).collect()
        }
    }

    fn lcs_len(old: &[String], new: &[String]) -> usize {
        let mut table = vec![vec![0usize; new.len() + 1]; old.len() + 1];
        for i in (0..old.len()).rev() {
            for j in (0..new.len()).rev() {
                table[i][j] = if old[i] == new[j] {
                    table[i + 1][j + 1] + 1
                } else {
                    table[i + 1][j].max(table[i][j + 1])
                };
            }
        }
        table[0][0]
    }

    #[test]
    fn generated_pairs_patch_back_with_minimal_edits() {
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        for _ in 0..2000 {
            let old = rng.sequence();
            let new = rng.sequence();
            let records = compute(&old, &new);
            assert_eq!(patch(&old, &records), new, "old={:?} new={:?}", old, new);

            let common = lcs_len(&old, &new);
            let removed: usize = records.iter().map(|r| r.old_count).sum();
            let added: usize = records.iter().map(|r| r.new_count).sum();
            assert_eq!(removed, old.len() - common, "old={:?} new={:?}", old, new);
            assert_eq!(added, new.len() - common, "old={:?} new={:?}", old, new);
        }
    }

    #[test]
    fn compute_is_idempotent() {
        let old = lines(&["a", "b", "c", "d"]);
        let new = lines(&["b", "c", "e", "d", "f"]);
        assert_eq!(compute(&old, &new), compute(&old, &new));
    }

    #[test]
    fn patch_with_subset_keeps_other_lines() {
        let old = lines(&["1", "2", "3", "4"]);
        let new = lines(&["1", "B", "3", "D"]);
        let records = compute(&old, &new);
        assert_eq!(records.len(), 2);
        assert_eq!(patch(&old, &records[1..]), lines(&["1", "2", "3", "D"]));
    }

    #[test]
    fn header_format() {
        let records = compute(&lines(&["a", "b"]), &lines(&["a", "c", "d"]));
        assert_eq!(records[0].header(), "@@ -2,1 +2,2 @@");
        assert_eq!(records[0].line_delta(), 1);
    }
}
