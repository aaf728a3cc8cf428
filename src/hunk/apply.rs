use super::Hunk;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Host-side document mutation. Ranges are 0-based, `end` exclusive.
pub trait DocumentEditor {
    fn replace_lines(&mut self, path: &Path, start: usize, end: usize, lines: &[String])
        -> Result<()>;
}

/// A concrete splice derived from a hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEdit {
    pub start: usize,
    pub end: usize,
    pub lines: Vec<String>,
}

impl LineEdit {
    /// Old lines → new lines. `shift` is the net line delta of earlier
    /// changes whose new content is currently in the document.
    pub fn applying(hunk: &Hunk, shift: isize) -> Self {
        let start = anchor(hunk, shift);
        LineEdit {
            start,
            end: start + hunk.change.old_count,
            lines: hunk.change.new_lines.clone(),
        }
    }

    /// New lines → old lines; the inverse of [`LineEdit::applying`].
    pub fn reverting(hunk: &Hunk, shift: isize) -> Self {
        let start = anchor(hunk, shift);
        LineEdit {
            start,
            end: start + hunk.change.new_count,
            lines: hunk.change.old_lines.clone(),
        }
    }
}

fn anchor(hunk: &Hunk, shift: isize) -> usize {
    let base = hunk.change.old_start.saturating_sub(1) as isize;
    (base + shift).max(0) as usize
}

/// Bring the hunk's new lines into a document that currently shows its old lines.
pub fn apply<E: DocumentEditor + ?Sized>(
    editor: &mut E,
    path: &Path,
    hunk: &Hunk,
    shift: isize,
) -> Result<()> {
    let edit = LineEdit::applying(hunk, shift);
    editor.replace_lines(path, edit.start, edit.end, &edit.lines)
}

/// Put the hunk's old lines back into a document that currently shows its new lines.
pub fn revert<E: DocumentEditor + ?Sized>(
    editor: &mut E,
    path: &Path,
    hunk: &Hunk,
    shift: isize,
) -> Result<()> {
    let edit = LineEdit::reverting(hunk, shift);
    editor.replace_lines(path, edit.start, edit.end, &edit.lines)
}

/// In-memory documents keyed by path
#[derive(Debug, Default, Clone)]
pub struct BufferEditor {
    buffers: HashMap<PathBuf, Vec<String>>,
}

impl BufferEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, lines: Vec<String>) {
        self.buffers.insert(path.into(), lines);
    }

    pub fn lines(&self, path: &Path) -> Option<&[String]> {
        self.buffers.get(path).map(|v| v.as_slice())
    }

    pub fn remove(&mut self, path: &Path) -> Option<Vec<String>> {
        self.buffers.remove(path)
    }
}

impl DocumentEditor for BufferEditor {
    fn replace_lines(
        &mut self,
        path: &Path,
        start: usize,
        end: usize,
        lines: &[String],
    ) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(path)
            .with_context(|| format!("No buffer open for {}", path.display()))?;
        splice(buffer, start, end, lines)
    }
}

/// Edits files on disk in place, keeping the file's line terminator and a
/// trailing newline if the file had one.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileEditor;

impl DocumentEditor for FileEditor {
    fn replace_lines(
        &mut self,
        path: &Path,
        start: usize,
        end: usize,
        lines: &[String],
    ) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let trailing_newline = text.is_empty() || text.ends_with('\n');
        let terminator = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let mut current: Vec<String> = text.lines().map(String::from).collect();

        splice(&mut current, start, end, lines)
            .with_context(|| format!("Cannot edit {}", path.display()))?;

        let mut out = current.join(terminator);
        if trailing_newline && !current.is_empty() {
            out.push_str(terminator);
        }
        std::fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn splice(buffer: &mut Vec<String>, start: usize, end: usize, lines: &[String]) -> Result<()> {
    if start > end || end > buffer.len() {
        anyhow::bail!(
            "Line range {}..{} out of bounds for {} lines",
            start,
            end,
            buffer.len()
        );
    }
    buffer.splice(start..end, lines.iter().cloned());
    Ok(())
}
