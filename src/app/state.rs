use crate::baseline::Baseline;
use crate::config::{ReviewConfig, ReviewMode};
use crate::diff::{self, ChangeRecord, LineSequence};
use crate::git::ChangeOrigin;
use crate::hunk::{self, DocumentEditor, Hunk, HunkId, HunkStatus, ReviewAction, UndoEntry, UndoStack};
use crate::watch::Fingerprint;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

// ── Errors ──

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("not watching {}", .0.display())]
    NotWatching(PathBuf),

    #[error("no pending hunk")]
    NoPendingHunk,

    #[error("nothing to undo")]
    EmptyHistory,

    #[error("unknown hunk #{0}")]
    UnknownHunk(HunkId),

    #[error(transparent)]
    Edit(#[from] anyhow::Error),
}

impl ReviewError {
    /// "Nothing to do" conditions the host should show, not treat as failures.
    pub fn is_informational(&self) -> bool {
        matches!(self, ReviewError::NoPendingHunk | ReviewError::EmptyHistory)
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;

// ── Batches & Outcomes ──

/// Why a batch was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchReason {
    /// New content differs from the baseline
    Changed,
    /// New content matches the baseline; no hunks remain
    Cleared,
    /// The watched file is gone
    Deleted,
}

/// The result of one diff pass, handed to listeners
#[derive(Debug, Clone, Serialize)]
pub struct HunkBatch {
    pub path: PathBuf,
    pub hunks: Vec<Hunk>,
    pub reason: BatchReason,
    pub origin: Option<ChangeOrigin>,
}

/// Outcome of a single accept/reject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub id: HunkId,
    pub status: HunkStatus,
    /// The decision closed the batch and advanced the baseline
    pub resolved: bool,
}

/// What an undo brought back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "undone", content = "id", rename_all = "lowercase")]
pub enum Undone {
    /// The hunk was still listed and is pending again
    Restored(HunkId),
    /// The hunk's batch had been resolved; the whole batch is open again
    Reopened(HunkId),
    /// The hunk was discarded by a newer pass and was put back as pending
    Reinserted(HunkId),
}

/// Handed out when a diff pass starts. The pass diffs against `baseline`
/// and presents `generation` when publishing.
#[derive(Debug, Clone)]
pub struct PassTicket {
    pub generation: u64,
    pub baseline: Arc<[String]>,
}

// ── Per-Document State ──

/// A resolved batch kept around so undo can reopen it
#[derive(Debug, Clone)]
struct ClosedBatch {
    base: Arc<[String]>,
    baseline_before: Arc<[String]>,
    hunks: Vec<Hunk>,
}

#[derive(Debug)]
pub struct DocumentState {
    /// Last-known-good content
    pub baseline: Baseline,
    /// Current batch, in position order
    pub hunks: Vec<Hunk>,
    /// False while paused
    pub watching: bool,
    /// Fingerprint of the last content processed (or expected after our own edits)
    pub last_fingerprint: Option<Fingerprint>,
    pub undo: UndoStack,
    /// Bumped when watching (re)starts; results from older generations are dropped
    pub generation: u64,
    /// Classification of the current batch, when git is enabled
    pub origin: Option<ChangeOrigin>,

    // Old side the current batch was computed against
    batch_base: Arc<[String]>,
    closed: Option<ClosedBatch>,
    // Hunks put back from a discarded batch: their positions may be stale,
    // so they never edit the document or the baseline.
    detached: HashSet<HunkId>,
}

/// Whether the hunk's new lines are currently in the document
fn shows_new(hunk: &Hunk, mode: ReviewMode) -> bool {
    match mode {
        ReviewMode::Live => hunk.status != HunkStatus::Rejected,
        ReviewMode::Preview => hunk.status == HunkStatus::Accepted,
    }
}

/// Net line delta of the hunks before `idx` whose new content is in the document
fn shift_before(hunks: &[Hunk], idx: usize, mode: ReviewMode, detached: &HashSet<HunkId>) -> isize {
    hunks[..idx]
        .iter()
        .filter(|h| !detached.contains(&h.id) && shows_new(h, mode))
        .map(|h| h.change.line_delta())
        .sum()
}

/// Edit the document for a decision that is about to be committed.
fn decision_edit(
    editor: &mut dyn DocumentEditor,
    path: &Path,
    hunk: &Hunk,
    action: ReviewAction,
    mode: ReviewMode,
    shift: isize,
) -> anyhow::Result<()> {
    match (mode, action) {
        (ReviewMode::Preview, ReviewAction::Accept) => hunk::apply(editor, path, hunk, shift),
        (ReviewMode::Live, ReviewAction::Reject) => hunk::revert(editor, path, hunk, shift),
        _ => Ok(()),
    }
}

/// Inverse of [`decision_edit`] for a decision being undone.
fn undo_edit(
    editor: &mut dyn DocumentEditor,
    path: &Path,
    hunk: &Hunk,
    action: ReviewAction,
    mode: ReviewMode,
    shift: isize,
) -> anyhow::Result<()> {
    match (mode, action) {
        (ReviewMode::Preview, ReviewAction::Accept) => hunk::revert(editor, path, hunk, shift),
        (ReviewMode::Live, ReviewAction::Reject) => hunk::apply(editor, path, hunk, shift),
        _ => Ok(()),
    }
}

impl DocumentState {
    fn new(lines: Vec<String>, generation: u64, max_undo: usize) -> Self {
        let fingerprint = Fingerprint::of(&lines);
        let baseline = Baseline::new(lines);
        DocumentState {
            batch_base: baseline.read(),
            baseline,
            hunks: Vec::new(),
            watching: true,
            last_fingerprint: Some(fingerprint),
            undo: UndoStack::new(max_undo),
            generation,
            origin: None,
            closed: None,
            detached: HashSet::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.hunks.iter().filter(|h| h.is_pending()).count()
    }

    fn index_of(&self, id: HunkId) -> Option<usize> {
        self.hunks.iter().position(|h| h.id == id)
    }

    fn patched(&self, keep: impl Fn(&Hunk) -> bool) -> LineSequence {
        let records: Vec<ChangeRecord> = self
            .hunks
            .iter()
            .filter(|h| !self.detached.contains(&h.id) && keep(h))
            .map(|h| h.change.clone())
            .collect();
        diff::patch(&self.batch_base, &records)
    }

    /// What the document holds given the decisions made so far
    fn expected_content(&self, mode: ReviewMode) -> LineSequence {
        self.patched(|h| shows_new(h, mode))
    }

    fn accepted_content(&self) -> LineSequence {
        self.patched(|h| h.status == HunkStatus::Accepted)
    }

    /// In live mode our own edits land in the watched file; remember what it
    /// should now contain so the echo notification is skipped.
    fn expect_document(&mut self, mode: ReviewMode) {
        if mode == ReviewMode::Live {
            self.last_fingerprint = Some(Fingerprint::of(&self.expected_content(mode)));
        }
    }

    fn clear_batch(&mut self) {
        self.hunks.clear();
        self.batch_base = self.baseline.read();
        self.closed = None;
        self.detached.clear();
    }

    /// Close the batch once nothing is pending; accepted content becomes the baseline.
    fn resolve_if_done(&mut self) -> bool {
        if self.hunks.is_empty() || self.hunks.iter().any(Hunk::is_pending) {
            return false;
        }
        let baseline_before = self.baseline.read();
        self.baseline.snapshot(self.accepted_content());

        let hunks: Vec<Hunk> = std::mem::take(&mut self.hunks)
            .into_iter()
            .filter(|h| !self.detached.contains(&h.id))
            .collect();
        let base = std::mem::replace(&mut self.batch_base, self.baseline.read());
        self.detached.clear();
        self.closed = Some(ClosedBatch {
            base,
            baseline_before,
            hunks,
        });
        true
    }

    /// Fold accepted decisions of a batch that a new pass is about to replace.
    fn fold_accepted(&mut self) {
        let any_accepted = self
            .hunks
            .iter()
            .any(|h| h.status == HunkStatus::Accepted && !self.detached.contains(&h.id));
        if any_accepted {
            self.baseline.snapshot(self.accepted_content());
        }
    }

    fn decide(
        &mut self,
        idx: usize,
        action: ReviewAction,
        mode: ReviewMode,
        path: &Path,
        editor: &mut dyn DocumentEditor,
    ) -> anyhow::Result<()> {
        let hunk = &self.hunks[idx];
        if !self.detached.contains(&hunk.id) {
            let shift = shift_before(&self.hunks, idx, mode, &self.detached);
            decision_edit(editor, path, hunk, action, mode, shift)?;
        }
        match action {
            ReviewAction::Accept => self.hunks[idx].accept(),
            ReviewAction::Reject => self.hunks[idx].reject(),
        }
        Ok(())
    }

    fn undo_decision(
        &mut self,
        entry: &UndoEntry,
        mode: ReviewMode,
        path: &Path,
        editor: &mut dyn DocumentEditor,
    ) -> Result<Undone> {
        let id = entry.snapshot.id;

        if let Some(idx) = self.index_of(id) {
            if !self.detached.contains(&id) {
                let shift = shift_before(&self.hunks, idx, mode, &self.detached);
                undo_edit(editor, path, &self.hunks[idx], entry.action, mode, shift)?;
            }
            self.hunks[idx].status = HunkStatus::Pending;
            return Ok(Undone::Restored(id));
        }

        if let Some(mut closed) = self.closed.take() {
            if let Some(idx) = closed.hunks.iter().position(|h| h.id == id) {
                let shift = shift_before(&closed.hunks, idx, mode, &HashSet::new());
                if let Err(e) = undo_edit(editor, path, &closed.hunks[idx], entry.action, mode, shift) {
                    self.closed = Some(closed);
                    return Err(e.into());
                }
                closed.hunks[idx].status = HunkStatus::Pending;
                self.baseline.snapshot(closed.baseline_before.to_vec());
                self.batch_base = closed.base;
                // Anything listed now was put back from an older batch
                let mut hunks = closed.hunks;
                hunks.append(&mut self.hunks);
                hunks.sort_by_key(|h| (h.change.old_start, h.change.new_start));
                self.hunks = hunks;
                return Ok(Undone::Reopened(id));
            }
            self.closed = Some(closed);
        }

        let mut hunk = entry.snapshot.clone();
        hunk.status = HunkStatus::Pending;
        let key = (hunk.change.old_start, hunk.change.new_start);
        let at = self
            .hunks
            .partition_point(|h| (h.change.old_start, h.change.new_start) <= key);
        self.detached.insert(id);
        self.hunks.insert(at, hunk);
        Ok(Undone::Reinserted(id))
    }
}

// ── Review State ──

/// Owns every watched document's state. The pipeline feeds it diff passes;
/// the host feeds it review decisions.
#[derive(Debug)]
pub struct ReviewState {
    config: ReviewConfig,
    documents: HashMap<PathBuf, DocumentState>,
    generations: u64,
}

impl ReviewState {
    pub fn new(config: ReviewConfig) -> Self {
        ReviewState {
            config,
            documents: HashMap::new(),
            generations: 0,
        }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn mode(&self) -> ReviewMode {
        self.config.mode
    }

    fn doc_mut(&mut self, path: &Path) -> Result<&mut DocumentState> {
        self.documents
            .get_mut(path)
            .ok_or_else(|| ReviewError::NotWatching(path.to_path_buf()))
    }

    // ── Watch lifecycle ──

    /// Start (or restart) watching with `lines` as the baseline. Returns the
    /// document's generation.
    pub fn start_watching(&mut self, path: impl Into<PathBuf>, lines: Vec<String>) -> u64 {
        self.generations += 1;
        let path = path.into();
        log::debug!("watching {} ({} lines)", path.display(), lines.len());
        self.documents.insert(
            path,
            DocumentState::new(lines, self.generations, self.config.max_undo),
        );
        self.generations
    }

    /// Forget the document. Hunks and undo history go with it.
    pub fn stop_watching(&mut self, path: &Path) -> bool {
        self.documents.remove(path).is_some()
    }

    pub fn pause(&mut self, path: &Path) -> Result<()> {
        self.doc_mut(path)?.watching = false;
        Ok(())
    }

    pub fn resume(&mut self, path: &Path) -> Result<()> {
        self.doc_mut(path)?.watching = true;
        Ok(())
    }

    /// Known and not paused
    pub fn is_watching(&self, path: &Path) -> bool {
        self.documents.get(path).is_some_and(|d| d.watching)
    }

    pub fn document(&self, path: &Path) -> Option<&DocumentState> {
        self.documents.get(path)
    }

    /// Watched paths, sorted
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.documents.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }

    // ── Baseline ──

    /// Take `lines` as the new baseline. The current batch no longer applies.
    pub fn snapshot(&mut self, path: &Path, lines: Vec<String>) -> Result<()> {
        let doc = self.doc_mut(path)?;
        doc.last_fingerprint = Some(Fingerprint::of(&lines));
        doc.baseline.snapshot(lines);
        doc.clear_batch();
        Ok(())
    }

    /// The host saved `lines` to the document.
    pub fn on_write(&mut self, path: &Path, lines: Vec<String>) -> Result<()> {
        let doc = self.doc_mut(path)?;
        doc.last_fingerprint = Some(Fingerprint::of(&lines));
        doc.baseline.snapshot(lines);
        doc.clear_batch();
        doc.undo.clear();
        Ok(())
    }

    // ── Diff passes ──

    /// Start a pass over content with fingerprint `fingerprint`. `None` when
    /// the document is not watched, paused, or the content was already processed.
    pub fn begin_pass(&mut self, path: &Path, fingerprint: Fingerprint) -> Option<PassTicket> {
        let doc = self.documents.get_mut(path).filter(|d| d.watching)?;
        if doc.last_fingerprint == Some(fingerprint) {
            log::debug!("{} unchanged since last pass", path.display());
            return None;
        }
        doc.last_fingerprint = Some(fingerprint);
        doc.fold_accepted();
        Some(PassTicket {
            generation: doc.generation,
            baseline: doc.baseline.read(),
        })
    }

    fn current(&mut self, path: &Path, generation: u64) -> Option<&mut DocumentState> {
        match self.documents.get_mut(path) {
            Some(doc) if doc.generation == generation && doc.watching => Some(doc),
            _ => {
                log::debug!("dropping stale pass result for {}", path.display());
                None
            }
        }
    }

    /// Replace the document's batch with the result of a pass.
    pub fn publish(
        &mut self,
        path: &Path,
        generation: u64,
        base: Arc<[String]>,
        changes: Vec<ChangeRecord>,
        origin: Option<ChangeOrigin>,
    ) -> Option<HunkBatch> {
        let context = self.config.context;
        let doc = self.current(path, generation)?;
        doc.clear_batch();
        doc.hunks = hunk::create_from_diff(changes, context);
        doc.batch_base = base;
        doc.origin = origin;

        let reason = if doc.hunks.is_empty() {
            BatchReason::Cleared
        } else {
            BatchReason::Changed
        };
        Some(HunkBatch {
            path: path.to_path_buf(),
            hunks: doc.hunks.clone(),
            reason,
            origin,
        })
    }

    /// The document could not be read: drop its hunks and forget the fingerprint.
    pub fn mark_deleted(&mut self, path: &Path, generation: u64) -> Option<HunkBatch> {
        let doc = self.current(path, generation)?;
        if doc.last_fingerprint.is_none() {
            // already reported
            return None;
        }
        doc.clear_batch();
        doc.last_fingerprint = None;
        doc.origin = None;
        Some(HunkBatch {
            path: path.to_path_buf(),
            hunks: Vec::new(),
            reason: BatchReason::Deleted,
            origin: None,
        })
    }

    // ── Queries ──

    pub fn hunks(&self, path: &Path) -> &[Hunk] {
        self.documents
            .get(path)
            .map(|d| d.hunks.as_slice())
            .unwrap_or(&[])
    }

    pub fn hunk_at(&self, path: &Path, line: usize) -> Option<&Hunk> {
        hunk::hunk_at(self.hunks(path), line)
    }

    pub fn next_hunk(&self, path: &Path, line: usize) -> Option<&Hunk> {
        hunk::next(self.hunks(path), line)
    }

    pub fn prev_hunk(&self, path: &Path, line: usize) -> Option<&Hunk> {
        hunk::prev(self.hunks(path), line)
    }

    /// Which document lists hunk `id`
    pub fn locate(&self, id: HunkId) -> Option<&Path> {
        self.documents
            .iter()
            .find(|(_, doc)| doc.hunks.iter().any(|h| h.id == id))
            .map(|(path, _)| path.as_path())
    }

    pub fn pending_count(&self, path: &Path) -> usize {
        self.documents.get(path).map_or(0, DocumentState::pending_count)
    }

    // ── Decisions ──

    pub fn accept(&mut self, path: &Path, id: HunkId, editor: &mut dyn DocumentEditor) -> Result<Decision> {
        self.decide(path, id, ReviewAction::Accept, editor)
    }

    pub fn reject(&mut self, path: &Path, id: HunkId, editor: &mut dyn DocumentEditor) -> Result<Decision> {
        self.decide(path, id, ReviewAction::Reject, editor)
    }

    /// Accept the pending hunk covering `line`.
    pub fn accept_at(&mut self, path: &Path, line: usize, editor: &mut dyn DocumentEditor) -> Result<Decision> {
        let id = self.pending_at(path, line)?;
        self.decide(path, id, ReviewAction::Accept, editor)
    }

    /// Reject the pending hunk covering `line`.
    pub fn reject_at(&mut self, path: &Path, line: usize, editor: &mut dyn DocumentEditor) -> Result<Decision> {
        let id = self.pending_at(path, line)?;
        self.decide(path, id, ReviewAction::Reject, editor)
    }

    fn pending_at(&mut self, path: &Path, line: usize) -> Result<HunkId> {
        let doc = self.doc_mut(path)?;
        doc.hunks
            .iter()
            .find(|h| h.is_pending() && hunk::range_of(h).contains(&line))
            .map(|h| h.id)
            .ok_or(ReviewError::NoPendingHunk)
    }

    fn decide(
        &mut self,
        path: &Path,
        id: HunkId,
        action: ReviewAction,
        editor: &mut dyn DocumentEditor,
    ) -> Result<Decision> {
        let mode = self.config.mode;
        let doc = self.doc_mut(path)?;
        let idx = doc.index_of(id).ok_or(ReviewError::UnknownHunk(id))?;
        if !doc.hunks[idx].is_pending() {
            return Err(ReviewError::NoPendingHunk);
        }

        let before = doc.hunks[idx].clone();
        doc.decide(idx, action, mode, path, editor)?;
        doc.undo.push(action, &before);
        let status = doc.hunks[idx].status;
        let resolved = doc.resolve_if_done();
        doc.expect_document(mode);

        Ok(Decision { id, status, resolved })
    }

    /// Accept every pending hunk. Returns how many were decided.
    pub fn accept_all(&mut self, path: &Path, editor: &mut dyn DocumentEditor) -> Result<usize> {
        self.decide_all(path, ReviewAction::Accept, editor)
    }

    /// Reject every pending hunk. Returns how many were decided.
    pub fn reject_all(&mut self, path: &Path, editor: &mut dyn DocumentEditor) -> Result<usize> {
        self.decide_all(path, ReviewAction::Reject, editor)
    }

    fn decide_all(
        &mut self,
        path: &Path,
        action: ReviewAction,
        editor: &mut dyn DocumentEditor,
    ) -> Result<usize> {
        let mode = self.config.mode;
        let doc = self.doc_mut(path)?;
        let pending: Vec<usize> = (0..doc.hunks.len())
            .filter(|&i| doc.hunks[i].is_pending())
            .collect();
        if pending.is_empty() {
            return Err(ReviewError::NoPendingHunk);
        }

        let mut decided = 0;
        let mut failure = None;
        for idx in pending {
            if let Err(e) = doc.decide(idx, action, mode, path, editor) {
                failure = Some(e);
                break;
            }
            decided += 1;
        }

        if decided > 0 {
            doc.undo.clear();
            doc.resolve_if_done();
            doc.expect_document(mode);
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(decided),
        }
    }

    /// Reverse the latest accept/reject on the document.
    pub fn undo(&mut self, path: &Path, editor: &mut dyn DocumentEditor) -> Result<Undone> {
        let mode = self.config.mode;
        let doc = self.doc_mut(path)?;
        let entry = doc.undo.pop().ok_or(ReviewError::EmptyHistory)?;
        match doc.undo_decision(&entry, mode, path, editor) {
            Ok(undone) => {
                doc.expect_document(mode);
                Ok(undone)
            }
            Err(e) => {
                doc.undo.restore(entry);
                Err(e)
            }
        }
    }
}
