mod cache;
mod classify;
mod status;

pub use cache::CachedVcs;
pub use classify::{classify, ChangeOrigin};
pub use status::{get_repo_root_in, git_show, is_tracked_in, repo_relative, GitCli};

use crate::diff::LineSequence;
use std::path::Path;

/// Repository-held versions of a document.
///
/// Every method degrades to "not tracked" / `None` when there is no
/// repository, so callers never need to special-case a missing VCS.
pub trait VcsProvider {
    fn is_tracked(&mut self, path: &Path) -> bool;

    /// Content staged in the index
    fn staged_content(&mut self, path: &Path) -> Option<LineSequence>;

    /// Content at HEAD
    fn head_content(&mut self, path: &Path) -> Option<LineSequence>;

    /// Drop anything cached for `path`
    fn invalidate(&mut self, _path: &Path) {}

    fn invalidate_all(&mut self) {}
}

/// Provider for documents outside any repository, or with git disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVcs;

impl VcsProvider for NoVcs {
    fn is_tracked(&mut self, _path: &Path) -> bool {
        false
    }

    fn staged_content(&mut self, _path: &Path) -> Option<LineSequence> {
        None
    }

    fn head_content(&mut self, _path: &Path) -> Option<LineSequence> {
        None
    }
}

impl<P: VcsProvider + ?Sized> VcsProvider for Box<P> {
    fn is_tracked(&mut self, path: &Path) -> bool {
        (**self).is_tracked(path)
    }

    fn staged_content(&mut self, path: &Path) -> Option<LineSequence> {
        (**self).staged_content(path)
    }

    fn head_content(&mut self, path: &Path) -> Option<LineSequence> {
        (**self).head_content(path)
    }

    fn invalidate(&mut self, path: &Path) {
        (**self).invalidate(path)
    }

    fn invalidate_all(&mut self) {
        (**self).invalidate_all()
    }
}
