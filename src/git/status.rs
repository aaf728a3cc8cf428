use super::VcsProvider;
use crate::diff::LineSequence;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

// ── Repo Info ──

/// Get the repository root directory for a specific path
pub fn get_repo_root_in(dir: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .with_context(|| format!("Failed to run git in '{}'", dir.display()))?;

    if !output.status.success() {
        anyhow::bail!("Not a git repository: {}", dir.display());
    }

    Ok(PathBuf::from(
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    ))
}

/// Split a file path into its repository root and the `/`-separated path
/// relative to that root. `None` when the file is not inside a repository.
pub fn repo_relative(path: &Path) -> Option<(PathBuf, String)> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    let parent = absolute.parent()?;
    let parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
    let file_name = absolute.file_name()?;

    let root = get_repo_root_in(&parent).ok()?;
    let root = root.canonicalize().unwrap_or(root);
    let rel = parent.join(file_name).strip_prefix(&root).ok()?.to_path_buf();

    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/");
    Some((root, rel))
}

/// Whether `rel_path` is known to the index
pub fn is_tracked_in(repo_root: &Path, rel_path: &str) -> bool {
    Command::new("git")
        .args(["ls-files", "--error-unmatch", "--", rel_path])
        .current_dir(repo_root)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Run `git show <spec>`; `Ok(None)` when the object does not exist
/// (e.g. a file that was never committed or staged).
pub fn git_show(repo_root: &Path, spec: &str) -> Result<Option<String>> {
    let output = Command::new("git")
        .args(["show", spec])
        .current_dir(repo_root)
        .output()
        .context("Failed to run git show")?;

    if !output.status.success() {
        log::debug!(
            "git show {} failed: {}",
            spec,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
}

fn show_lines(path: &Path, prefix: &str) -> Option<LineSequence> {
    let (root, rel) = repo_relative(path)?;
    match git_show(&root, &format!("{prefix}:{rel}")) {
        Ok(content) => content.map(|text| text.lines().map(String::from).collect()),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    }
}

// ── Provider ──

/// Reads index and HEAD content by shelling out to `git`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl VcsProvider for GitCli {
    fn is_tracked(&mut self, path: &Path) -> bool {
        match repo_relative(path) {
            Some((root, rel)) => is_tracked_in(&root, &rel),
            None => false,
        }
    }

    fn staged_content(&mut self, path: &Path) -> Option<LineSequence> {
        show_lines(path, "")
    }

    fn head_content(&mut self, path: &Path) -> Option<LineSequence> {
        show_lines(path, "HEAD")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn outside_a_repository_nothing_is_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loose.txt");
        std::fs::write(&path, "hello\n").unwrap();

        // Only meaningful when the temp dir is not itself inside a repository.
        if repo_relative(&path).is_some() {
            return;
        }
        let mut git = GitCli;
        assert!(!git.is_tracked(&path));
        assert!(git.staged_content(&path).is_none());
        assert!(git.head_content(&path).is_none());
    }

    #[test]
    fn reads_index_and_head_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        if !git(root, &["init", "-q"]) {
            // git is not installed
            return;
        }
        git(root, &["config", "user.email", "test@example.com"]);
        git(root, &["config", "user.name", "Test"]);

        let path = root.join("notes.txt");
        std::fs::write(&path, "one\ntwo\n").unwrap();
        assert!(git(root, &["add", "notes.txt"]));
        assert!(git(root, &["-c", "commit.gpgsign=false", "commit", "-q", "-m", "init"]));

        std::fs::write(&path, "one\nTWO\n").unwrap();
        assert!(git(root, &["add", "notes.txt"]));
        std::fs::write(&path, "one\nTWO\nthree\n").unwrap();

        let mut provider = GitCli;
        assert!(provider.is_tracked(&path));
        assert_eq!(
            provider.head_content(&path),
            Some(vec!["one".to_string(), "two".to_string()])
        );
        assert_eq!(
            provider.staged_content(&path),
            Some(vec!["one".to_string(), "TWO".to_string()])
        );
    }
}
