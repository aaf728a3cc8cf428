use super::VcsProvider;
use crate::diff;
use serde::Serialize;
use std::path::Path;

/// Who most likely authored a change to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    /// Written by a tool outside the session (the default)
    External,
    /// Pre-existing working-tree drift from HEAD
    Unstaged,
    /// Content now matches what is staged in the index
    Staged,
}

impl ChangeOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeOrigin::External => "external",
            ChangeOrigin::Unstaged => "unstaged",
            ChangeOrigin::Staged => "staged",
        }
    }
}

/// Classify the transition `old → new` of `path` against index and HEAD.
///
/// Heuristic: ambiguous cases resolve toward the VCS classification, and
/// anything that matches no rule is `External`.
pub fn classify(
    vcs: &mut dyn VcsProvider,
    path: &Path,
    old: &[String],
    new: &[String],
) -> ChangeOrigin {
    if !vcs.is_tracked(path) {
        return ChangeOrigin::External;
    }

    if let Some(staged) = vcs.staged_content(path) {
        if staged.as_slice() == new {
            return ChangeOrigin::Staged;
        }
    }

    let Some(head) = vcs.head_content(path) else {
        return ChangeOrigin::External;
    };

    let old_drifted = !diff::compute(old, &head).is_empty();
    let new_drifted = !diff::compute(new, &head).is_empty();

    // A fresh change on a file that matched HEAD belongs to the external tool.
    if old_drifted && new_drifted {
        ChangeOrigin::Unstaged
    } else {
        ChangeOrigin::External
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::LineSequence;
    use crate::git::NoVcs;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct Fixed {
        staged: Option<LineSequence>,
        head: Option<LineSequence>,
    }

    impl VcsProvider for Fixed {
        fn is_tracked(&mut self, _path: &Path) -> bool {
            true
        }

        fn staged_content(&mut self, _path: &Path) -> Option<LineSequence> {
            self.staged.clone()
        }

        fn head_content(&mut self, _path: &Path) -> Option<LineSequence> {
            self.head.clone()
        }
    }

    #[test]
    fn no_repository_is_always_external() {
        let path = Path::new("anything.txt");
        for (old, new) in [
            (lines(&[]), lines(&["a"])),
            (lines(&["a"]), lines(&["a"])),
            (lines(&["a", "b"]), lines(&["c"])),
        ] {
            assert_eq!(classify(&mut NoVcs, path, &old, &new), ChangeOrigin::External);
        }
    }

    #[test]
    fn matching_the_index_is_staged() {
        let mut vcs = Fixed {
            staged: Some(lines(&["a", "B"])),
            head: Some(lines(&["a", "b"])),
        };
        let origin = classify(&mut vcs, Path::new("f"), &lines(&["a", "b"]), &lines(&["a", "B"]));
        assert_eq!(origin, ChangeOrigin::Staged);
    }

    #[test]
    fn fresh_change_on_clean_file_is_external() {
        let mut vcs = Fixed {
            staged: Some(lines(&["a", "b"])),
            head: Some(lines(&["a", "b"])),
        };
        let origin = classify(&mut vcs, Path::new("f"), &lines(&["a", "b"]), &lines(&["a", "c"]));
        assert_eq!(origin, ChangeOrigin::External);
    }

    #[test]
    fn change_on_top_of_existing_drift_is_unstaged() {
        let mut vcs = Fixed {
            staged: Some(lines(&["a", "b"])),
            head: Some(lines(&["a", "b"])),
        };
        let origin = classify(
            &mut vcs,
            Path::new("f"),
            &lines(&["a", "b", "local"]),
            &lines(&["a", "c", "local"]),
        );
        assert_eq!(origin, ChangeOrigin::Unstaged);
    }

    #[test]
    fn missing_head_falls_back_to_external() {
        let mut vcs = Fixed {
            staged: None,
            head: None,
        };
        let origin = classify(&mut vcs, Path::new("f"), &lines(&["x"]), &lines(&["y"]));
        assert_eq!(origin, ChangeOrigin::External);
    }
}
