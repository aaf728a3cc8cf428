//! Debounce, dedupe and diff: turns raw notifications into hunk batches.
//!
//! Time is passed in by the caller, so the host loop decides how to wait
//! (`recv_timeout` until [`Pipeline::next_deadline`]) and tests never sleep.

use super::{DocumentReader, Fingerprint, RawEvent, RawKind};
use crate::app::{HunkBatch, PassTicket, ReviewState};
use crate::config::{BaselineSource, EtConfig};
use crate::diff;
use crate::git::{self, CachedVcs, GitCli, VcsProvider};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives every published batch.
pub trait BatchListener {
    fn on_batch(&mut self, batch: &HunkBatch);
}

impl<F: FnMut(&HunkBatch)> BatchListener for F {
    fn on_batch(&mut self, batch: &HunkBatch) {
        self(batch)
    }
}

/// Per-document pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    /// Waiting for a quiet period to end. Every new notification pushes the deadline out.
    DebouncePending { deadline: Instant },
    Processing,
}

pub struct Pipeline<R> {
    reader: R,
    vcs: Option<Box<dyn VcsProvider>>,
    source: BaselineSource,
    debounce: Duration,
    phases: HashMap<PathBuf, WatchPhase>,
}

impl<R: DocumentReader> Pipeline<R> {
    pub fn new(reader: R, debounce: Duration) -> Self {
        Pipeline {
            reader,
            vcs: None,
            source: BaselineSource::Snapshot,
            debounce,
            phases: HashMap::new(),
        }
    }

    /// Pipeline wired the way the config asks: git classification through a
    /// TTL-cached `git` CLI when enabled.
    pub fn from_config(reader: R, config: &EtConfig) -> Self {
        let mut pipeline = Pipeline::new(reader, config.watch.debounce());
        pipeline.source = config.review.baseline;
        if config.git.enabled {
            pipeline.vcs = Some(Box::new(CachedVcs::new(GitCli, config.git.cache_ttl())));
        } else if config.review.baseline != BaselineSource::Snapshot {
            log::warn!("git is disabled; diffing against the snapshot baseline");
        }
        pipeline
    }

    pub fn with_vcs(mut self, vcs: Box<dyn VcsProvider>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn with_source(mut self, source: BaselineSource) -> Self {
        self.source = source;
        self
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn phase(&self, path: &Path) -> WatchPhase {
        self.phases.get(path).copied().unwrap_or(WatchPhase::Idle)
    }

    /// Earliest debounce deadline, if any document is waiting
    pub fn next_deadline(&self) -> Option<Instant> {
        self.phases
            .values()
            .filter_map(|phase| match phase {
                WatchPhase::DebouncePending { deadline } => Some(*deadline),
                _ => None,
            })
            .min()
    }

    // ── Watch lifecycle ──

    /// Watch `path` with its current content as the baseline. A missing file
    /// starts from an empty baseline.
    pub fn start_watching(&mut self, state: &mut ReviewState, path: &Path) -> u64 {
        self.phases.remove(path);
        if let Some(vcs) = self.vcs.as_mut() {
            vcs.invalidate(path);
        }
        let lines = self.reader.read(path).unwrap_or_default();
        state.start_watching(path, lines)
    }

    pub fn stop_watching(&mut self, state: &mut ReviewState, path: &Path) -> bool {
        self.phases.remove(path);
        state.stop_watching(path)
    }

    pub fn pause(&mut self, state: &mut ReviewState, path: &Path) -> crate::app::Result<()> {
        state.pause(path)?;
        self.phases.remove(path);
        Ok(())
    }

    pub fn resume(&mut self, state: &mut ReviewState, path: &Path) -> crate::app::Result<()> {
        state.resume(path)
    }

    // ── Events ──

    /// Record a raw notification; (re)starts the document's debounce.
    pub fn notify(&mut self, state: &ReviewState, event: RawEvent, now: Instant) {
        if !state.is_watching(&event.path) {
            log::trace!("ignoring notification for {}", event.path.display());
            return;
        }
        if event.kind == RawKind::Deleted {
            log::debug!("{} reported deleted", event.path.display());
        }
        let deadline = now + self.debounce;
        self.phases
            .insert(event.path, WatchPhase::DebouncePending { deadline });
    }

    /// Run every pass whose deadline has passed. Returns the number of
    /// batches handed to `listener`.
    pub fn poll(
        &mut self,
        state: &mut ReviewState,
        now: Instant,
        listener: &mut dyn BatchListener,
    ) -> usize {
        let mut due: Vec<PathBuf> = self
            .phases
            .iter()
            .filter_map(|(path, phase)| match phase {
                WatchPhase::DebouncePending { deadline } if *deadline <= now => Some(path.clone()),
                _ => None,
            })
            .collect();
        due.sort();

        let mut published = 0;
        for path in due {
            self.phases.insert(path.clone(), WatchPhase::Processing);
            let batch = self.process(state, &path);
            self.phases.remove(&path);

            if let Some(batch) = batch {
                log::debug!(
                    "{}: {:?}, {} hunk(s)",
                    path.display(),
                    batch.reason,
                    batch.hunks.len()
                );
                listener.on_batch(&batch);
                published += 1;
            }
        }
        published
    }

    fn process(&mut self, state: &mut ReviewState, path: &Path) -> Option<HunkBatch> {
        let generation = state.document(path)?.generation;

        let Some(lines) = self.reader.read(path) else {
            if let Some(vcs) = self.vcs.as_mut() {
                vcs.invalidate(path);
            }
            return state.mark_deleted(path, generation);
        };

        let ticket = state.begin_pass(path, Fingerprint::of(&lines))?;
        let base = self.baseline_for(path, &ticket);
        let changes = diff::compute(&base, &lines);
        let origin = self
            .vcs
            .as_mut()
            .map(|vcs| git::classify(&mut **vcs, path, &ticket.baseline, &lines));

        state.publish(path, ticket.generation, base, changes, origin)
    }

    /// The old side of this pass: VCS content when configured and available,
    /// the stored snapshot otherwise.
    fn baseline_for(&mut self, path: &Path, ticket: &PassTicket) -> Arc<[String]> {
        let fetched = match (self.source, self.vcs.as_mut()) {
            (BaselineSource::Index, Some(vcs)) => vcs.staged_content(path),
            (BaselineSource::Head, Some(vcs)) => vcs.head_content(path),
            _ => None,
        };
        match fetched {
            Some(lines) => lines.into(),
            None => Arc::clone(&ticket.baseline),
        }
    }
}
