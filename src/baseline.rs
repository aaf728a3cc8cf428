//! Per-document baseline: the "old" side every diff pass is computed against.
//!
//! Readers get a shared immutable handle. Replacing the baseline swaps the
//! handle and leaves any handle already taken by an in-flight pass intact, so
//! a pass always diffs against the exact snapshot it started with.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Baseline {
    lines: Arc<[String]>,
    revision: u64,
}

impl Baseline {
    pub fn new(lines: Vec<String>) -> Self {
        Baseline {
            lines: lines.into(),
            revision: 0,
        }
    }

    /// Replace the baseline. Idempotent in content; the revision still advances.
    pub fn snapshot(&mut self, lines: Vec<String>) {
        self.lines = lines.into();
        self.revision += 1;
    }

    /// Take a read handle for the duration of one pass.
    pub fn read(&self) -> Arc<[String]> {
        Arc::clone(&self.lines)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of times the baseline has been replaced since creation
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
