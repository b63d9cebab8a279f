use crate::errors::{Result, StaxError};
use crate::git::{ReplayOutcome, Vcs};
use crate::stack::graph::DependencyGraph;
use crate::stack::restack_state::{RestackState, RestackStateFile, WorkUnit};
use crate::stack::store::BranchStore;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Result of a restack, move or continue that ran to completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestackOutcome {
    /// Every branch replayed during the run, in execution order
    pub rebased_branches: Vec<String>,
    /// Rebased branches with an open pull request that now needs a push
    pub branches_with_pull_requests: Vec<String>,
}

/// Result of aborting an interrupted run
#[derive(Debug, Clone, PartialEq)]
pub struct AbortOutcome {
    /// Branch whose replay was open (or pending) when the run stopped
    pub interrupted_branch: String,
    /// Branches replayed before the interruption; these are not undone
    pub rebased_branches: Vec<String>,
    /// Branch checked out again, if HEAD had to move
    pub returned_to: Option<String>,
}

/// What happened to a single unit
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UnitResult {
    Rebased,
    Skipped,
    Conflict(String),
}

/// Cascading rebase scheduler.
///
/// Idle -> Running -> ConflictPaused -> Idle. The checkpoint file is the only
/// record of the paused state; while it exists nothing new may start.
pub struct RestackEngine<'a, V: Vcs> {
    pub(crate) vcs: &'a V,
    pub(crate) store: &'a BranchStore,
    pub(crate) state_file: RestackStateFile,
    pub(crate) trunk: String,
}

impl<'a, V: Vcs> RestackEngine<'a, V> {
    pub fn new(
        vcs: &'a V,
        store: &'a BranchStore,
        state_file: RestackStateFile,
        trunk: impl Into<String>,
    ) -> Self {
        Self {
            vcs,
            store,
            state_file,
            trunk: trunk.into(),
        }
    }

    /// Engine whose checkpoint lives in the primary working copy
    pub fn for_repository(vcs: &'a V, store: &'a BranchStore, trunk: &str) -> Result<Self> {
        let primary = vcs.primary_worktree_path()?;
        Ok(Self::new(vcs, store, RestackStateFile::new(&primary), trunk))
    }

    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    pub fn in_progress(&self) -> bool {
        self.state_file.exists()
    }

    /// Fail fast when an interrupted run is waiting for continue or abort
    pub fn ensure_idle(&self) -> Result<()> {
        if self.in_progress() {
            return Err(StaxError::RestackInProgress);
        }
        Ok(())
    }

    /// Whether `branch` must be replayed onto `parent`.
    ///
    /// True when the parent is gone from git, or when the recorded branch
    /// point no longer matches the parent's tip.
    pub fn needs_restack(&self, branch: &str, parent: &str) -> Result<bool> {
        if !self.vcs.branch_exists(parent) {
            return Ok(true);
        }
        let parent_tip = self.vcs.commit_hash(parent)?;
        Ok(self.store.get(branch).branch_point != parent_tip)
    }

    /// One planning cycle: the units needed right now for the stack `root`
    /// belongs to (its lineage up to trunk and everything below it), parents
    /// before children. `None` or trunk covers every stack.
    pub fn plan(&self, root: Option<&str>) -> Result<Vec<WorkUnit>> {
        let root = root.filter(|r| !r.is_empty()).unwrap_or(self.trunk.as_str());
        let graph = DependencyGraph::from_store(self.store, &self.trunk)?;
        let scope = graph.current_stack(root)?;
        let mut units = Vec::new();

        for (parent, child) in scope.edges_below(&self.trunk) {
            if !self.is_plannable(&child)? {
                continue;
            }
            if self.needs_restack(&child, &parent)? {
                units.push(WorkUnit::new(child, parent));
            }
        }

        debug!("Planned {} unit(s) for the stack of '{}'", units.len(), root);
        Ok(units)
    }

    /// Untracked placeholders and tombstoned branches still missing from git
    /// can only ever be skipped, so they are never queued.
    fn is_plannable(&self, branch: &str) -> Result<bool> {
        let meta = self.store.get(branch);
        if !meta.is_tracked() {
            return Ok(false);
        }
        Ok(!(meta.is_deleted() && !self.vcs.branch_exists(branch)))
    }

    /// Replay `root` (or every stack) until nothing is left to do
    pub fn restack(&self, root: Option<&str>) -> Result<RestackOutcome> {
        self.ensure_idle()?;
        self.store.reload()?;

        let starting_branch = self.vcs.current_branch()?;
        let root = root
            .filter(|r| !r.is_empty())
            .unwrap_or(self.trunk.as_str())
            .to_string();
        info!("Restacking from '{}'", root);

        let mut state = RestackState {
            starting_branch,
            root_branch: root,
            ..Default::default()
        };
        self.run(&mut state, Vec::new())?;
        self.finish(&state)
    }

    /// Drain `pending`, then keep replanning from the checkpoint's root.
    ///
    /// Any failure other than a conflict removes the checkpoint.
    pub(crate) fn run(&self, state: &mut RestackState, pending: Vec<WorkUnit>) -> Result<()> {
        let result = self.drive(state, pending);
        if let Err(e) = &result {
            if !e.is_conflict() {
                self.discard_checkpoint();
            }
        }
        result
    }

    fn drive(&self, state: &mut RestackState, mut pending: Vec<WorkUnit>) -> Result<()> {
        let root = state.root_branch.clone();
        loop {
            if pending.is_empty() {
                pending = self.plan(Some(&root))?;
                if pending.is_empty() {
                    return Ok(());
                }
            }
            self.drain(state, std::mem::take(&mut pending))?;
        }
    }

    /// Execute units in order, writing the checkpoint before each one
    fn drain(&self, state: &mut RestackState, units: Vec<WorkUnit>) -> Result<()> {
        for (i, unit) in units.iter().enumerate() {
            state.current_branch = unit.branch.clone();
            state.current_parent = unit.parent.clone();
            state.remaining_work = units[i + 1..].to_vec();
            state.replay_started = false;
            self.state_file.save(state)?;

            match self.execute_unit(unit)? {
                UnitResult::Skipped => {}
                UnitResult::Rebased => {
                    self.record_success(unit)?;
                    state.rebased_branches.push(unit.branch.clone());
                }
                UnitResult::Conflict(detail) => {
                    warn!("Conflicts rebasing {} onto {}", unit.branch, unit.parent);
                    state.replay_started = true;
                    self.state_file.save(state)?;
                    return Err(StaxError::conflict(
                        unit.branch.as_str(),
                        unit.parent.as_str(),
                        detail.as_str(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn execute_unit(&self, unit: &WorkUnit) -> Result<UnitResult> {
        let meta = self.store.get(&unit.branch);

        if !self.vcs.branch_exists(&unit.branch) {
            if self.store.exists(&unit.branch) && !meta.is_deleted() {
                self.store
                    .update(&unit.branch, |m| m.mark_deleted(Utc::now()))?;
            }
            info!("Skipping '{}': branch no longer exists", unit.branch);
            return Ok(UnitResult::Skipped);
        }

        let parent = self.reparent_if_parent_deleted(&unit.branch)?;
        if parent != unit.parent {
            debug!(
                "Skipping '{}' this cycle: parent is now '{}'",
                unit.branch, parent
            );
            return Ok(UnitResult::Skipped);
        }

        if meta.branch_point.is_empty() {
            return Err(StaxError::branch(format!(
                "Branch point is not set for '{}'",
                unit.branch
            )));
        }

        match self
            .vcs
            .replay_onto(&unit.parent, &meta.branch_point, &unit.branch)?
        {
            ReplayOutcome::Completed => Ok(UnitResult::Rebased),
            ReplayOutcome::Conflict(detail) => Ok(UnitResult::Conflict(detail)),
        }
    }

    /// Point `branch` at the nearest living ancestor when its recorded parent
    /// is gone. Returns the parent to use from now on.
    fn reparent_if_parent_deleted(&self, branch: &str) -> Result<String> {
        let meta = self.store.get(branch);
        if meta.parent.is_empty() || meta.parent == self.trunk {
            return Ok(meta.parent);
        }
        if self.vcs.branch_exists(&meta.parent) {
            return Ok(meta.parent);
        }

        let new_parent = self.find_nearest_living_ancestor(&meta.parent);
        self.store
            .update(branch, |m| m.parent = new_parent.clone())?;
        warn!(
            "Parent branch '{}' of '{}' no longer exists, reparenting to '{}'",
            meta.parent, branch, new_parent
        );
        Ok(new_parent)
    }

    /// Walk recorded parents until one exists in git; trunk when none does
    fn find_nearest_living_ancestor(&self, branch: &str) -> String {
        let mut visited = HashSet::new();
        let mut cursor = branch.to_string();

        loop {
            if cursor == self.trunk || !self.store.exists(&cursor) {
                return self.trunk.clone();
            }
            if self.vcs.branch_exists(&cursor) {
                return cursor;
            }
            let parent = self.store.get(&cursor).parent;
            if parent.is_empty() || !visited.insert(cursor) {
                return self.trunk.clone();
            }
            cursor = parent;
        }
    }

    /// Advance the branch point to the parent's new tip
    fn record_success(&self, unit: &WorkUnit) -> Result<()> {
        let parent_tip = self.vcs.commit_hash(&unit.parent)?;
        self.store.update(&unit.branch, |m| {
            m.branch_point = parent_tip.clone();
            m.deleted = None;
        })?;
        debug!("'{}' now branches from {}", unit.branch, parent_tip);
        Ok(())
    }

    /// Resume after the user resolved conflicts
    pub fn continue_run(&self) -> Result<RestackOutcome> {
        let mut state = self.state_file.load()?;
        self.store.reload()?;
        let unit = state.current_unit();

        if self.vcs.is_replay_in_progress(&unit.branch)? {
            while self.vcs.is_replay_in_progress(&unit.branch)? {
                info!("Continuing rebase of {}", unit.branch);
                if let ReplayOutcome::Conflict(detail) = self.vcs.continue_replay(&unit.branch)? {
                    return Err(StaxError::conflict(
                        unit.branch.as_str(),
                        unit.parent.as_str(),
                        detail.as_str(),
                    ));
                }
            }
        } else if self.already_on_parent(&unit)? {
            info!("Rebase of {} was already completed", unit.branch);
        } else if !state.replay_started {
            // Stopped between the checkpoint write and the replay itself
            info!("Rebase of {} never started, running it now", unit.branch);
            let mut pending = vec![unit];
            pending.append(&mut state.remaining_work);
            self.run(&mut state, pending)?;
            return self.finish(&state);
        } else {
            return Err(StaxError::rebase(format!(
                "Rebase of '{}' appears to have been aborted ('{}' still diverges from '{}')\n\
                 Run `stax abort` to discard the interrupted restack, then restack again",
                unit.branch, unit.branch, unit.parent
            )));
        }

        let pending = std::mem::take(&mut state.remaining_work);
        let bookkeeping = self.record_success(&unit).map(|()| {
            state.rebased_branches.push(unit.branch.clone());
        });
        if let Err(e) = bookkeeping {
            self.discard_checkpoint();
            return Err(e);
        }

        self.run(&mut state, pending)?;
        self.finish(&state)
    }

    /// Whether `unit.branch` already sits on the tip of `unit.parent`
    fn already_on_parent(&self, unit: &WorkUnit) -> Result<bool> {
        if !self.vcs.branch_exists(&unit.branch) || !self.vcs.branch_exists(&unit.parent) {
            return Ok(false);
        }
        let merge_base = self.vcs.merge_base(&unit.branch, &unit.parent)?;
        Ok(merge_base == self.vcs.commit_hash(&unit.parent)?)
    }

    /// Cancel an interrupted run; branches already replayed stay replayed
    pub fn abort(&self) -> Result<AbortOutcome> {
        let state = self.state_file.load()?;

        let abort_result = match self.vcs.is_replay_in_progress(&state.current_branch) {
            Ok(true) => {
                info!("Aborting rebase of {}", state.current_branch);
                self.vcs.abort_replay(&state.current_branch)
            }
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        self.state_file.delete()?;
        abort_result?;

        let returned_to = self.return_to(&state.starting_branch)?;

        Ok(AbortOutcome {
            interrupted_branch: state.current_branch,
            rebased_branches: state.rebased_branches,
            returned_to,
        })
    }

    pub(crate) fn finish(&self, state: &RestackState) -> Result<RestackOutcome> {
        if let Err(e) = self.state_file.delete() {
            warn!("Failed to delete restack state: {}", e);
        }

        self.return_to(&state.starting_branch).map_err(|e| {
            StaxError::branch(format!(
                "Restack succeeded but could not return to '{}': {e}",
                state.starting_branch
            ))
        })?;

        let branches_with_pull_requests = state
            .rebased_branches
            .iter()
            .filter(|branch| self.store.get(branch).has_pull_request())
            .cloned()
            .collect();

        Ok(RestackOutcome {
            rebased_branches: state.rebased_branches.clone(),
            branches_with_pull_requests,
        })
    }

    /// Check out `branch` unless HEAD is already there
    fn return_to(&self, branch: &str) -> Result<Option<String>> {
        if branch.is_empty() {
            return Ok(None);
        }
        if self.vcs.current_branch().ok().as_deref() == Some(branch) {
            return Ok(None);
        }
        self.vcs.checkout(branch)?;
        Ok(Some(branch.to_string()))
    }

    fn discard_checkpoint(&self) {
        if let Err(e) = self.state_file.delete() {
            warn!("Failed to delete restack state: {}", e);
        }
    }
}
