use crate::config;
use crate::errors::{Result, StaxError};
use crate::utils::atomic_file;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One scheduled replay: move `branch` onto the tip of `parent`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub branch: String,
    pub parent: String,
}

impl WorkUnit {
    pub fn new(branch: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            parent: parent.into(),
        }
    }
}

/// Checkpoint of an interrupted restack or move.
///
/// While this file exists no new restack or move may start.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RestackState {
    /// Branch checked out when the run started; restored at the end
    pub starting_branch: String,
    /// Unit being replayed when the run stopped
    pub current_branch: String,
    pub current_parent: String,
    /// Units not yet attempted, in execution order
    #[serde(default)]
    pub remaining_work: Vec<WorkUnit>,
    /// Branches already replayed in this run
    #[serde(default)]
    pub rebased_branches: Vec<String>,
    /// Branch whose stack is replanned on continue; empty means the whole graph
    #[serde(default)]
    pub root_branch: String,
    /// Set once git has been asked to replay the current unit
    #[serde(default)]
    pub replay_started: bool,
}

impl RestackState {
    pub fn current_unit(&self) -> WorkUnit {
        WorkUnit::new(&self.current_branch, &self.current_parent)
    }
}

/// Location of the checkpoint for one primary working copy
#[derive(Debug, Clone)]
pub struct RestackStateFile {
    /// Newest name first; older names are still honoured by readers
    candidates: Vec<PathBuf>,
}

impl RestackStateFile {
    pub fn new(primary_worktree: &Path) -> Self {
        Self {
            candidates: config::candidate_paths(primary_worktree, config::RESTACK_STATE_FILES),
        }
    }

    /// Checkpoint at exactly `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }

    fn write_path(&self) -> &Path {
        &self.candidates[0]
    }

    fn existing(&self) -> Option<&PathBuf> {
        self.candidates.iter().find(|path| path.exists())
    }

    /// True when an interrupted run is waiting for continue or abort
    pub fn exists(&self) -> bool {
        self.existing().is_some()
    }

    /// Save state under the newest name, retiring any legacy copy
    pub fn save(&self, state: &RestackState) -> Result<()> {
        atomic_file::write_json(self.write_path(), state)?;

        for legacy in self.candidates.iter().skip(1) {
            if legacy.exists() {
                std::fs::remove_file(legacy).map_err(|e| {
                    StaxError::config(format!("Failed to remove legacy restack state: {e}"))
                })?;
            }
        }

        tracing::debug!("Saved restack state to {:?}", self.write_path());
        Ok(())
    }

    /// Load the checkpoint; absence is reported as `NoRestackInProgress`
    pub fn load(&self) -> Result<RestackState> {
        let path = self.existing().ok_or(StaxError::NoRestackInProgress)?;

        let json = std::fs::read_to_string(path)
            .map_err(|e| StaxError::config(format!("Failed to read restack state: {e}")))?;

        let state = serde_json::from_str(&json)
            .map_err(|e| StaxError::config(format!("Failed to parse restack state: {e}")))?;

        tracing::debug!("Loaded restack state from {:?}", path);
        Ok(state)
    }

    /// Remove every copy of the checkpoint; nothing to remove is fine
    pub fn delete(&self) -> Result<()> {
        for path in &self.candidates {
            if path.exists() {
                std::fs::remove_file(path)
                    .map_err(|e| StaxError::config(format!("Failed to delete restack state: {e}")))?;
                tracing::debug!("Deleted restack state file {:?}", path);
            }
        }
        Ok(())
    }
}
