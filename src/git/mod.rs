pub mod repository;

#[cfg(test)]
pub(crate) mod fake;

pub use repository::{GitRepository, WorktreeEntry};

use crate::errors::{Result, StaxError};
use std::path::{Path, PathBuf};

/// How a replay (rebase) attempt ended when git itself did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    Completed,
    /// Stopped on conflicts; the operation is still open in the worktree
    Conflict(String),
}

/// Version-control primitives the restack engines are written against
pub trait Vcs {
    fn branch_exists(&self, name: &str) -> bool;

    /// Checked-out branch name; fails on a detached HEAD
    fn current_branch(&self) -> Result<String>;

    /// Full commit id a branch or revision points at
    fn commit_hash(&self, reference: &str) -> Result<String>;

    fn merge_base(&self, a: &str, b: &str) -> Result<String>;

    /// Replay the commits of `branch` after `old_base` onto the tip of `new_base`
    fn replay_onto(&self, new_base: &str, old_base: &str, branch: &str) -> Result<ReplayOutcome>;

    /// Resume the open replay of `branch` after conflicts were resolved
    fn continue_replay(&self, branch: &str) -> Result<ReplayOutcome>;

    fn abort_replay(&self, branch: &str) -> Result<()>;

    fn is_replay_in_progress(&self, branch: &str) -> Result<bool>;

    fn checkout(&self, branch: &str) -> Result<()>;

    /// Root of the main working copy, shared by every linked worktree
    fn primary_worktree_path(&self) -> Result<PathBuf>;
}

/// Resolve the per-worktree git directory from a workdir path.
/// Handles both normal repos (.git is a directory) and worktrees (.git is a file
/// containing `gitdir: <path>`).
pub fn resolve_git_dir(workdir: &Path) -> Result<PathBuf> {
    let git_path = workdir.join(".git");
    if git_path.is_dir() {
        Ok(git_path)
    } else if git_path.is_file() {
        let content = std::fs::read_to_string(&git_path)
            .map_err(|e| StaxError::config(format!("Failed to read .git file: {e}")))?;
        let gitdir = content
            .strip_prefix("gitdir: ")
            .map(|s| s.trim())
            .ok_or_else(|| StaxError::config("Invalid .git file format"))?;
        let resolved = if Path::new(gitdir).is_absolute() {
            PathBuf::from(gitdir)
        } else {
            workdir.join(gitdir)
        };
        Ok(resolved)
    } else {
        Err(StaxError::config(format!(
            "Not a git repository: {}",
            git_path.display()
        )))
    }
}

/// Branch a rebase in `git_dir` is operating on, if one is open there
pub fn rebasing_branch(git_dir: &Path) -> Option<String> {
    ["rebase-merge", "rebase-apply"].iter().find_map(|dir| {
        let head_name = std::fs::read_to_string(git_dir.join(dir).join("head-name")).ok()?;
        let head_name = head_name.trim();
        Some(
            head_name
                .strip_prefix("refs/heads/")
                .unwrap_or(head_name)
                .to_string(),
        )
    })
}

/// True when `git_dir` holds the state of an unfinished rebase
pub fn is_rebase_dir_present(git_dir: &Path) -> bool {
    git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
}

/// Open the repository containing the current directory
pub fn get_current_repository() -> Result<GitRepository> {
    let current_dir = std::env::current_dir()
        .map_err(|e| StaxError::config(format!("Could not get current directory: {e}")))?;
    GitRepository::open(&current_dir)
}
