use crate::errors::{Result, StaxError};
use crate::git::Vcs;
use crate::stack::graph::DependencyGraph;
use crate::stack::rebase::{RestackEngine, RestackOutcome};
use crate::stack::restack_state::{RestackState, WorkUnit};
use tracing::info;

/// Moves a branch and its whole subtree onto a new parent
pub struct MoveEngine<'a, V: Vcs> {
    restack: RestackEngine<'a, V>,
}

impl<'a, V: Vcs> MoveEngine<'a, V> {
    pub fn new(restack: RestackEngine<'a, V>) -> Self {
        Self { restack }
    }

    pub fn restack_engine(&self) -> &RestackEngine<'a, V> {
        &self.restack
    }

    /// Units a move of `branch` onto `target` would run: the branch itself,
    /// then every descendant whether or not its branch point still matches.
    pub fn plan_move(&self, branch: &str, target: &str) -> Result<Vec<WorkUnit>> {
        let engine = &self.restack;

        if branch == engine.trunk {
            return Err(StaxError::validation("Cannot move the trunk branch"));
        }
        if branch == target {
            return Err(StaxError::validation(format!(
                "Cannot move '{branch}' onto itself"
            )));
        }
        if !engine.vcs.branch_exists(branch) {
            return Err(StaxError::branch(format!(
                "Branch '{branch}' does not exist"
            )));
        }
        if !engine.vcs.branch_exists(target) {
            return Err(StaxError::branch(format!(
                "Target branch '{target}' does not exist"
            )));
        }

        let meta = engine.store.get(branch);
        if meta.branch_point.is_empty() {
            return Err(StaxError::branch(format!(
                "Branch point is not set for '{branch}' (run `stax add` first)"
            )));
        }

        let graph = DependencyGraph::from_store(engine.store, &engine.trunk)?;
        if graph.descendants(branch).iter().any(|d| d == target) {
            return Err(StaxError::graph(format!(
                "Cannot move '{branch}' onto its own descendant '{target}'"
            )));
        }

        let mut units = vec![WorkUnit::new(branch, target)];
        units.extend(
            graph
                .edges_below(branch)
                .into_iter()
                .map(|(parent, child)| WorkUnit::new(child, parent)),
        );
        Ok(units)
    }

    /// Move `branch` (default: the current branch) onto `target`
    pub fn move_branch(&self, branch: Option<&str>, target: &str) -> Result<RestackOutcome> {
        let engine = &self.restack;
        engine.ensure_idle()?;
        engine.store.reload()?;

        let starting_branch = engine.vcs.current_branch()?;
        let branch = branch
            .filter(|b| !b.is_empty())
            .unwrap_or(starting_branch.as_str())
            .to_string();

        let units = self.plan_move(&branch, target)?;
        info!(
            "Moving {} and {} descendant(s) onto {}",
            branch,
            units.len() - 1,
            target
        );

        engine
            .store
            .update(&branch, |m| m.parent = target.to_string())?;

        let mut state = RestackState {
            starting_branch,
            root_branch: branch,
            ..Default::default()
        };
        engine.run(&mut state, units)?;
        engine.finish(&state)
    }
}
