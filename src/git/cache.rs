use super::VcsProvider;
use crate::diff::LineSequence;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Slot<T> {
    fetched_at: Instant,
    value: T,
}

#[derive(Debug, Default, Clone)]
struct Entry {
    tracked: Option<Slot<bool>>,
    staged: Option<Slot<Option<LineSequence>>>,
    head: Option<Slot<Option<LineSequence>>>,
}

/// Return the cached value while it is younger than `ttl`, refetching otherwise.
fn fresh<T: Clone>(slot: &mut Option<Slot<T>>, ttl: Duration, fetch: impl FnOnce() -> T) -> T {
    if let Some(s) = slot {
        if s.fetched_at.elapsed() < ttl {
            return s.value.clone();
        }
    }
    let value = fetch();
    *slot = Some(Slot {
        fetched_at: Instant::now(),
        value: value.clone(),
    });
    value
}

/// Per-path TTL cache in front of another provider. Tracking state, index
/// content and HEAD content expire independently.
#[derive(Debug)]
pub struct CachedVcs<P> {
    inner: P,
    ttl: Duration,
    entries: HashMap<PathBuf, Entry>,
}

impl<P: VcsProvider> CachedVcs<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        CachedVcs {
            inner,
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: VcsProvider> VcsProvider for CachedVcs<P> {
    fn is_tracked(&mut self, path: &Path) -> bool {
        let entry = self.entries.entry(path.to_path_buf()).or_default();
        let inner = &mut self.inner;
        fresh(&mut entry.tracked, self.ttl, || inner.is_tracked(path))
    }

    fn staged_content(&mut self, path: &Path) -> Option<LineSequence> {
        let entry = self.entries.entry(path.to_path_buf()).or_default();
        let inner = &mut self.inner;
        fresh(&mut entry.staged, self.ttl, || inner.staged_content(path))
    }

    fn head_content(&mut self, path: &Path) -> Option<LineSequence> {
        let entry = self.entries.entry(path.to_path_buf()).or_default();
        let inner = &mut self.inner;
        fresh(&mut entry.head, self.ttl, || inner.head_content(path))
    }

    fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
        self.inner.invalidate(path);
    }

    fn invalidate_all(&mut self) {
        self.entries.clear();
        self.inner.invalidate_all();
    }
}
