//! In-memory commit graph implementing [`Vcs`] for engine tests.

use crate::errors::{Result, StaxError};
use crate::git::{ReplayOutcome, Vcs};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct PendingReplay {
    branch: String,
    new_base: String,
    old_base: String,
}

pub(crate) struct FakeVcs {
    /// commit id -> parent commit id
    parents: RefCell<HashMap<String, Option<String>>>,
    branches: RefCell<HashMap<String, String>>,
    current: RefCell<String>,
    next_id: Cell<usize>,
    conflict_once: RefCell<HashSet<String>>,
    fail_on: RefCell<HashSet<String>>,
    pending: RefCell<Option<PendingReplay>>,
    /// (branch, new_base) for every replay attempt, in order
    pub replays: RefCell<Vec<(String, String)>>,
    pub checkouts: RefCell<Vec<String>>,
    root: PathBuf,
}

impl FakeVcs {
    /// Repository with a single commit on `main`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let fake = Self {
            parents: RefCell::new(HashMap::new()),
            branches: RefCell::new(HashMap::new()),
            current: RefCell::new("main".to_string()),
            next_id: Cell::new(0),
            conflict_once: RefCell::new(HashSet::new()),
            fail_on: RefCell::new(HashSet::new()),
            pending: RefCell::new(None),
            replays: RefCell::new(Vec::new()),
            checkouts: RefCell::new(Vec::new()),
            root: root.into(),
        };
        let initial = fake.new_commit(None);
        fake.branches
            .borrow_mut()
            .insert("main".to_string(), initial);
        fake
    }

    fn new_commit(&self, parent: Option<String>) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let commit = format!("c{id:04}");
        self.parents.borrow_mut().insert(commit.clone(), parent);
        commit
    }

    /// Create `name` at the tip of `from` and add `commits` commits on it
    pub fn branch(&self, name: &str, from: &str, commits: usize) -> String {
        let mut tip = self.tip(from);
        for _ in 0..commits {
            tip = self.new_commit(Some(tip));
        }
        self.branches
            .borrow_mut()
            .insert(name.to_string(), tip.clone());
        tip
    }

    /// Create `name` on a fresh root commit sharing no history with the rest
    pub fn orphan(&self, name: &str) -> String {
        let root = self.new_commit(None);
        self.branches
            .borrow_mut()
            .insert(name.to_string(), root.clone());
        root
    }

    /// Add a commit to an existing branch
    pub fn commit(&self, branch: &str) -> String {
        let tip = self.new_commit(Some(self.tip(branch)));
        self.branches
            .borrow_mut()
            .insert(branch.to_string(), tip.clone());
        tip
    }

    pub fn tip(&self, branch: &str) -> String {
        self.branches
            .borrow()
            .get(branch)
            .cloned()
            .unwrap_or_else(|| panic!("unknown branch {branch}"))
    }

    pub fn delete_branch(&self, branch: &str) {
        self.branches.borrow_mut().remove(branch);
    }

    pub fn set_current(&self, branch: &str) {
        *self.current.borrow_mut() = branch.to_string();
    }

    /// Next replay of `branch` stops on conflicts
    pub fn conflict_next(&self, branch: &str) {
        self.conflict_once.borrow_mut().insert(branch.to_string());
    }

    /// Replays of `branch` fail without leaving anything open
    pub fn fail_replay(&self, branch: &str) {
        self.fail_on.borrow_mut().insert(branch.to_string());
    }

    /// Drop the open replay as if the user ran `git rebase --abort` by hand
    pub fn abandon_pending(&self) {
        self.pending.borrow_mut().take();
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    fn ancestry(&self, commit: &str) -> Vec<String> {
        let parents = self.parents.borrow();
        let mut chain = vec![commit.to_string()];
        let mut cursor = commit.to_string();
        while let Some(Some(parent)) = parents.get(&cursor) {
            chain.push(parent.clone());
            cursor = parent.clone();
        }
        chain
    }

    fn resolve(&self, reference: &str) -> Result<String> {
        if let Some(tip) = self.branches.borrow().get(reference) {
            return Ok(tip.clone());
        }
        if self.parents.borrow().contains_key(reference) {
            return Ok(reference.to_string());
        }
        Err(StaxError::branch(format!("Could not resolve '{reference}'")))
    }

    fn finish_replay(&self, replay: &PendingReplay) -> Result<()> {
        let tip = self.resolve(&replay.branch)?;
        let old_base = self.resolve(&replay.old_base)?;
        let chain = self.ancestry(&tip);
        let own = chain
            .iter()
            .position(|commit| *commit == old_base)
            .ok_or_else(|| StaxError::rebase(format!("{old_base} is not an ancestor of {tip}")))?;

        let mut new_tip = self.resolve(&replay.new_base)?;
        for _ in 0..own {
            new_tip = self.new_commit(Some(new_tip));
        }
        self.branches
            .borrow_mut()
            .insert(replay.branch.clone(), new_tip);
        Ok(())
    }
}

impl Vcs for FakeVcs {
    fn branch_exists(&self, name: &str) -> bool {
        self.branches.borrow().contains_key(name)
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.current.borrow().clone())
    }

    fn commit_hash(&self, reference: &str) -> Result<String> {
        self.resolve(reference)
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let left = self.ancestry(&self.resolve(a)?);
        let right: HashSet<String> = self.ancestry(&self.resolve(b)?).into_iter().collect();
        left.into_iter()
            .find(|commit| right.contains(commit))
            .ok_or_else(|| StaxError::branch(format!("No common ancestor between {a} and {b}")))
    }

    fn replay_onto(&self, new_base: &str, old_base: &str, branch: &str) -> Result<ReplayOutcome> {
        self.replays
            .borrow_mut()
            .push((branch.to_string(), new_base.to_string()));

        if self.pending.borrow().is_some() {
            return Err(StaxError::rebase("a rebase is already open"));
        }
        if self.fail_on.borrow().contains(branch) {
            return Err(StaxError::rebase(format!("cannot rebase {branch}")));
        }

        let replay = PendingReplay {
            branch: branch.to_string(),
            new_base: new_base.to_string(),
            old_base: old_base.to_string(),
        };
        if self.conflict_once.borrow_mut().remove(branch) {
            *self.pending.borrow_mut() = Some(replay);
            return Ok(ReplayOutcome::Conflict(format!("CONFLICT in {branch}.txt")));
        }

        self.finish_replay(&replay)?;
        Ok(ReplayOutcome::Completed)
    }

    fn continue_replay(&self, _branch: &str) -> Result<ReplayOutcome> {
        let replay = self
            .pending
            .borrow_mut()
            .take()
            .ok_or_else(|| StaxError::rebase("no rebase in progress"))?;
        self.finish_replay(&replay)?;
        Ok(ReplayOutcome::Completed)
    }

    fn abort_replay(&self, _branch: &str) -> Result<()> {
        self.pending.borrow_mut().take();
        Ok(())
    }

    fn is_replay_in_progress(&self, _branch: &str) -> Result<bool> {
        Ok(self.pending.borrow().is_some())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        if !self.branch_exists(branch) {
            return Err(StaxError::branch(format!("Could not check out '{branch}'")));
        }
        self.checkouts.borrow_mut().push(branch.to_string());
        self.set_current(branch);
        Ok(())
    }

    fn primary_worktree_path(&self) -> Result<PathBuf> {
        Ok(self.root.clone())
    }
}
