use std::ops::Range;

use serde::Serialize;

use super::myers::{edit_script, Edit};
use super::ChangeKind;

/// A changed region inside a single line pair, as byte ranges into each line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordChange {
    pub kind: ChangeKind,
    pub old: Range<usize>,
    pub new: Range<usize>,
}

/// Split into alternating runs of whitespace and non-whitespace, keeping the
/// byte offset of each token.
fn tokenize(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (i, ch) in line.char_indices() {
        let space = ch.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                tokens.push((start, &line[start..i]));
                start = i;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < line.len() {
        tokens.push((start, &line[start..]));
    }
    tokens
}

/// Word-level diff of one old/new line pair, for sub-line highlighting.
pub fn compute_words(old_line: &str, new_line: &str) -> Vec<WordChange> {
    let old_tokens = tokenize(old_line);
    let new_tokens = tokenize(new_line);
    let old_text: Vec<&str> = old_tokens.iter().map(|(_, t)| *t).collect();
    let new_text: Vec<&str> = new_tokens.iter().map(|(_, t)| *t).collect();

    let offset_of = |tokens: &[(usize, &str)], idx: usize, total: usize| {
        tokens.get(idx).map(|(o, _)| *o).unwrap_or(total)
    };

    let mut changes = Vec::new();
    let mut open: Option<(usize, usize)> = None;
    let (mut oi, mut ni) = (0, 0);

    let close = |from: (usize, usize), to: (usize, usize), changes: &mut Vec<WordChange>| {
        let old = offset_of(&old_tokens, from.0, old_line.len())
            ..offset_of(&old_tokens, to.0, old_line.len());
        let new = offset_of(&new_tokens, from.1, new_line.len())
            ..offset_of(&new_tokens, to.1, new_line.len());
        let kind = match (old.is_empty(), new.is_empty()) {
            (false, false) => ChangeKind::Change,
            (false, true) => ChangeKind::Delete,
            _ => ChangeKind::Add,
        };
        changes.push(WordChange { kind, old, new });
    };

    for edit in edit_script(&old_text, &new_text) {
        match edit {
            Edit::Equal => {
                if let Some(from) = open.take() {
                    close(from, (oi, ni), &mut changes);
                }
                oi += 1;
                ni += 1;
            }
            Edit::Delete => {
                open.get_or_insert((oi, ni));
                oi += 1;
            }
            Edit::Insert => {
                open.get_or_insert((oi, ni));
                ni += 1;
            }
        }
    }
    if let Some(from) = open {
        close(from, (oi, ni), &mut changes);
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_keeps_whitespace_runs() {
        let tokens: Vec<&str> = tokenize("let  x = 1;").into_iter().map(|(_, t)| t).collect();
        assert_eq!(tokens, vec!["let", "  ", "x", " ", "=", " ", "1;"]);
    }

    #[test]
    fn changed_word_in_the_middle() {
        let changes = compute_words("let x = 1;", "let y = 1;");
        assert_eq!(
            changes,
            vec![WordChange {
                kind: ChangeKind::Change,
                old: 4..5,
                new: 4..5,
            }]
        );
    }

    #[test]
    fn appended_words() {
        let changes = compute_words("foo", "foo bar");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Add);
        assert_eq!(changes[0].old, 3..3);
        assert_eq!(&"foo bar"[changes[0].new.clone()], " bar");
    }

    #[test]
    fn identical_lines_have_no_word_changes() {
        assert!(compute_words("same line", "same line").is_empty());
        assert!(compute_words("", "").is_empty());
    }

    #[test]
    fn multibyte_offsets_stay_on_char_boundaries() {
        let old = "größe = 1";
        let new = "größe = 2";
        let changes = compute_words(old, new);
        assert_eq!(changes.len(), 1);
        assert_eq!(&old[changes[0].old.clone()], "1");
        assert_eq!(&new[changes[0].new.clone()], "2");
    }
}
