mod fingerprint;
mod pipeline;
mod reader;

pub use fingerprint::Fingerprint;
pub use pipeline::{BatchListener, Pipeline, WatchPhase};
pub use reader::{DocumentReader, FsReader};

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// What a raw notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Changed,
    Deleted,
}

/// An undebounced notification for one watched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawKind,
}

impl RawEvent {
    pub fn changed(path: impl Into<PathBuf>) -> Self {
        RawEvent {
            path: path.into(),
            kind: RawKind::Changed,
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        RawEvent {
            path: path.into(),
            kind: RawKind::Deleted,
        }
    }
}

/// Canonical form of a path whose file may not exist (yet, or any more).
fn canonical(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

fn raw_kind(kind: &EventKind) -> Option<RawKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Remove(_) => Some(RawKind::Deleted),
        _ => Some(RawKind::Changed),
    }
}

/// Forwards notify events for individual files onto a channel.
///
/// Parent directories are watched rather than the files themselves so that
/// atomic saves (write to a temp file, rename over the original) and
/// delete/recreate cycles keep producing events.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    /// Canonical path -> path as the caller named it
    files: Arc<Mutex<HashMap<PathBuf, PathBuf>>>,
    /// Watched parent directories and how many files each one serves
    dirs: HashMap<PathBuf, usize>,
}

impl FileWatcher {
    pub fn new<T>(tx: mpsc::Sender<T>) -> Result<Self>
    where
        T: From<RawEvent> + Send + 'static,
    {
        let files: Arc<Mutex<HashMap<PathBuf, PathBuf>>> = Arc::new(Mutex::new(HashMap::new()));
        let files_clone = Arc::clone(&files);

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("File watcher error: {}", e);
                        return;
                    }
                };
                let Some(kind) = raw_kind(&event.kind) else {
                    return;
                };
                let Ok(files) = files_clone.lock() else {
                    return;
                };
                for path in &event.paths {
                    if let Some(original) = files.get(&canonical(path)) {
                        // The receiver is gone only while shutting down
                        let _ = tx.send(T::from(RawEvent {
                            path: original.clone(),
                            kind,
                        }));
                    }
                }
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok(FileWatcher {
            watcher,
            files,
            dirs: HashMap::new(),
        })
    }

    /// Start delivering events for `path`. The file does not have to exist,
    /// but its directory does.
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        let canonical = canonical(path);
        let dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("{} has no parent directory", path.display()))?;

        {
            let mut files = self
                .files
                .lock()
                .map_err(|_| anyhow::anyhow!("File watcher state poisoned"))?;
            if files.insert(canonical, path.to_path_buf()).is_some() {
                return Ok(());
            }
        }

        let count = self.dirs.entry(dir.clone()).or_insert(0);
        if *count == 0 {
            self.watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }
        *count += 1;
        Ok(())
    }

    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        let canonical = canonical(path);
        let removed = self
            .files
            .lock()
            .map_err(|_| anyhow::anyhow!("File watcher state poisoned"))?
            .remove(&canonical)
            .is_some();
        if !removed {
            return Ok(());
        }

        let Some(dir) = canonical.parent().map(Path::to_path_buf) else {
            return Ok(());
        };
        if let Some(count) = self.dirs.get_mut(&dir) {
            *count -= 1;
            if *count == 0 {
                self.dirs.remove(&dir);
                self.watcher
                    .unwatch(&dir)
                    .with_context(|| format!("Failed to unwatch {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Paths currently watched, as the caller named them
    pub fn watched(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .files
            .lock()
            .map(|files| files.values().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}
