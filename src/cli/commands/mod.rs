pub mod branch;
pub mod config;
pub mod restack;

use crate::config::{load_settings, Settings};
use crate::errors::Result;
use crate::git::{get_current_repository, GitRepository, Vcs};
use crate::stack::BranchStore;
use std::path::PathBuf;

/// Everything a command needs: the repository, its settings and its branch database
pub struct CommandContext {
    pub repo: GitRepository,
    pub root: PathBuf,
    pub settings: Settings,
    pub store: BranchStore,
}

impl CommandContext {
    /// Open the repository containing the current directory.
    ///
    /// State always lives in the primary working copy, so linked worktrees
    /// share one database and one checkpoint.
    pub fn open() -> Result<Self> {
        let repo = get_current_repository()?;
        let root = repo.primary_worktree_path()?;
        let settings = load_settings(&root)?;
        let store = BranchStore::open(&root)?;
        Ok(Self {
            repo,
            root,
            settings,
            store,
        })
    }

    pub fn trunk(&self) -> &str {
        &self.settings.git.trunk_branch
    }
}
