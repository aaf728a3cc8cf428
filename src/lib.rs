//! Detect, classify and selectively accept line-level changes that another
//! process makes to watched files.
//!
//! Detection runs raw notification → debounce/dedupe → read → diff against a
//! baseline → hunks. Review decisions flow back through [`app::ReviewState`].

pub mod app;
pub mod baseline;
pub mod config;
pub mod diff;
pub mod git;
pub mod hunk;
pub mod watch;

pub use app::{BatchReason, HunkBatch, ReviewError, ReviewState};
pub use diff::{compute, ChangeKind, ChangeRecord, LineSequence};
pub use hunk::{Hunk, HunkId, HunkStatus};
pub use watch::{Pipeline, RawEvent};
