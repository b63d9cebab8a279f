use crate::errors::{Result, StaxError};
use crate::git::{is_rebase_dir_present, rebasing_branch, resolve_git_dir, ReplayOutcome, Vcs};
use git2::{BranchType, Repository};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

/// A checkout of the repository: the primary working copy or a linked worktree
#[derive(Debug, Clone)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    /// Per-worktree git directory (holds HEAD and any rebase state)
    pub git_dir: PathBuf,
    /// Checked-out branch; `None` when detached
    pub branch: Option<String>,
    pub is_primary: bool,
}

/// Wrapper around git2::Repository; history-rewriting commands go through the git binary
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open the Git repository containing `path`
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| StaxError::config(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| StaxError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    /// Working directory this handle was opened in
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every checkout of this repository, primary first
    pub fn worktrees(&self) -> Result<Vec<WorktreeEntry>> {
        let primary_path = self.primary_worktree_path()?;
        let primary = Repository::open(&primary_path)?;
        let mut entries = vec![WorktreeEntry {
            path: primary_path,
            git_dir: primary.path().to_path_buf(),
            branch: head_branch(&primary),
            is_primary: true,
        }];

        let names = self.repo.worktrees()?;
        for name in names.iter().flatten() {
            let worktree = match self.repo.find_worktree(name) {
                Ok(worktree) => worktree,
                Err(e) => {
                    debug!("Skipping worktree '{}': {}", name, e);
                    continue;
                }
            };
            let linked = match Repository::open_from_worktree(&worktree) {
                Ok(repo) => repo,
                Err(e) => {
                    debug!("Skipping unreadable worktree '{}': {}", name, e);
                    continue;
                }
            };
            entries.push(WorktreeEntry {
                path: worktree.path().to_path_buf(),
                git_dir: linked.path().to_path_buf(),
                branch: head_branch(&linked),
                is_primary: false,
            });
        }

        Ok(entries)
    }

    /// Directory a replay of `branch` runs in.
    ///
    /// A worktree already rebasing the branch wins, then a worktree that has
    /// it checked out, then the worktree stax was invoked from.
    fn replay_dir(&self, branch: &str) -> Result<PathBuf> {
        let worktrees = self.worktrees()?;

        if let Some(entry) = worktrees
            .iter()
            .find(|entry| rebasing_branch(&entry.git_dir).as_deref() == Some(branch))
        {
            return Ok(entry.path.clone());
        }

        if let Some(entry) = worktrees
            .iter()
            .find(|entry| entry.branch.as_deref() == Some(branch))
        {
            debug!("'{}' is checked out in {:?}", branch, entry.path);
            return Ok(entry.path.clone());
        }

        Ok(self.path.clone())
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        debug!("git {} (in {:?})", args.join(" "), dir);
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .env("GIT_EDITOR", "true")
            .output()
            .map_err(|e| StaxError::rebase(format!("Failed to run git {}: {e}", args.join(" "))))
    }

    /// Classify a failed rebase command by whether it left an operation open
    fn classify_failure(&self, dir: &Path, command: &str, output: &Output) -> Result<ReplayOutcome> {
        let detail = command_detail(output);
        if is_rebase_dir_present(&resolve_git_dir(dir)?) {
            Ok(ReplayOutcome::Conflict(detail))
        } else {
            Err(StaxError::rebase(format!("{command} failed: {detail}")))
        }
    }
}

impl Vcs for GitRepository {
    fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    fn current_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| StaxError::branch(format!("Could not get HEAD: {e}")))?;

        if !head.is_branch() {
            return Err(StaxError::branch("HEAD is detached; check out a branch first"));
        }

        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| StaxError::branch("Invalid branch name"))
    }

    fn commit_hash(&self, reference: &str) -> Result<String> {
        let commit = match self.repo.find_branch(reference, BranchType::Local) {
            Ok(branch) => branch.get().peel_to_commit(),
            Err(_) => self
                .repo
                .revparse_single(reference)
                .and_then(|object| object.peel_to_commit()),
        }
        .map_err(|e| StaxError::branch(format!("Could not resolve '{reference}': {e}")))?;

        Ok(commit.id().to_string())
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let one = git2::Oid::from_str(&self.commit_hash(a)?)?;
        let two = git2::Oid::from_str(&self.commit_hash(b)?)?;
        let base = self.repo.merge_base(one, two).map_err(|e| {
            StaxError::branch(format!("No common ancestor between '{a}' and '{b}': {e}"))
        })?;
        Ok(base.to_string())
    }

    fn replay_onto(&self, new_base: &str, old_base: &str, branch: &str) -> Result<ReplayOutcome> {
        let dir = self.replay_dir(branch)?;
        info!("Rebasing {} onto {}", branch, new_base);

        let output = self.git(
            &dir,
            &[
                "-c",
                "core.hooksPath=/dev/null",
                "rebase",
                "--onto",
                new_base,
                old_base,
                branch,
            ],
        )?;

        if output.status.success() {
            return Ok(ReplayOutcome::Completed);
        }
        self.classify_failure(&dir, &format!("git rebase --onto {new_base} {old_base} {branch}"), &output)
    }

    fn continue_replay(&self, branch: &str) -> Result<ReplayOutcome> {
        let dir = self.replay_dir(branch)?;
        let output = self.git(
            &dir,
            &[
                "-c",
                "core.hooksPath=/dev/null",
                "-c",
                "core.editor=true",
                "rebase",
                "--continue",
            ],
        )?;

        if output.status.success() {
            return Ok(ReplayOutcome::Completed);
        }
        self.classify_failure(&dir, "git rebase --continue", &output)
    }

    fn abort_replay(&self, branch: &str) -> Result<()> {
        let dir = self.replay_dir(branch)?;
        let output = self.git(&dir, &["rebase", "--abort"])?;
        if !output.status.success() {
            return Err(StaxError::rebase(format!(
                "git rebase --abort failed: {}",
                command_detail(&output)
            )));
        }
        Ok(())
    }

    fn is_replay_in_progress(&self, branch: &str) -> Result<bool> {
        let dir = self.replay_dir(branch)?;
        Ok(is_rebase_dir_present(&resolve_git_dir(&dir)?))
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        let output = self.git(&self.path, &["checkout", "--quiet", branch])?;
        if !output.status.success() {
            return Err(StaxError::branch(format!(
                "Could not check out '{branch}': {}",
                command_detail(&output)
            )));
        }
        Ok(())
    }

    fn primary_worktree_path(&self) -> Result<PathBuf> {
        self.repo
            .commondir()
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StaxError::config("Could not locate the primary working copy"))
    }
}

fn head_branch(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    head.shorthand().map(str::to_string)
}

fn command_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    text.lines().take(6).collect::<Vec<_>>().join("\n")
}
