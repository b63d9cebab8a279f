use crate::errors::{Result, StaxError};
use crate::git::Vcs;
use crate::providers::StatusProvider;
use crate::stack::metadata::{BranchMetadata, PullRequestMetadata};
use crate::stack::store::BranchStore;
use crate::utils::worker_pool;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Branch bookkeeping outside of restacking: tracking, tombstones and
/// remote pull request state.
pub struct StackManager<'a, V: Vcs> {
    vcs: &'a V,
    store: &'a BranchStore,
    trunk: String,
}

/// What a remote status refresh changed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RefreshSummary {
    /// Branches that now carry pull request details
    pub updated: Vec<String>,
    /// Branches whose empty parent was filled in from the PR base
    pub parents_inferred: Vec<String>,
}

impl<'a, V: Vcs> StackManager<'a, V> {
    pub fn new(vcs: &'a V, store: &'a BranchStore, trunk: impl Into<String>) -> Self {
        Self {
            vcs,
            store,
            trunk: trunk.into(),
        }
    }

    /// Start tracking `branch` as stacked on `parent`.
    ///
    /// Without an explicit `branch_point` the merge base of the two branches
    /// is recorded.
    pub fn track_branch(
        &self,
        branch: &str,
        parent: &str,
        branch_point: Option<&str>,
    ) -> Result<BranchMetadata> {
        if branch.is_empty() || parent.is_empty() {
            return Err(StaxError::validation("Branch and parent must be named"));
        }
        if branch == self.trunk {
            return Err(StaxError::validation(format!(
                "'{branch}' is the trunk branch and cannot be tracked"
            )));
        }
        if branch == parent {
            return Err(StaxError::validation(format!(
                "'{branch}' cannot be its own parent"
            )));
        }
        if !self.vcs.branch_exists(branch) {
            return Err(StaxError::branch(format!(
                "Branch '{branch}' does not exist"
            )));
        }
        if !self.vcs.branch_exists(parent) {
            return Err(StaxError::branch(format!(
                "Parent branch '{parent}' does not exist"
            )));
        }

        self.store.reload()?;
        self.check_no_cycle(branch, parent)?;

        let branch_point = match branch_point {
            Some(reference) => self.vcs.commit_hash(reference)?,
            None => self.vcs.merge_base(branch, parent)?,
        };
        debug!("Tracking {} on {} at {}", branch, parent, branch_point);

        let meta = self.store.update(branch, |m| {
            m.parent = parent.to_string();
            m.branch_point = branch_point;
            m.deleted = None;
            if m.created.is_none() {
                m.created = Some(Utc::now());
            }
        })?;
        info!("Tracking '{}' on top of '{}'", branch, parent);
        Ok(meta)
    }

    /// Walk up from `parent`; reaching `branch` means the new edge would close a loop
    fn check_no_cycle(&self, branch: &str, parent: &str) -> Result<()> {
        let mut seen = HashSet::new();
        let mut cursor = parent.to_string();
        while !cursor.is_empty() && cursor != self.trunk {
            if cursor == branch {
                return Err(StaxError::graph(format!(
                    "Stacking '{branch}' on '{parent}' would create a cycle"
                )));
            }
            if !seen.insert(cursor.clone()) {
                break;
            }
            cursor = self.store.get(&cursor).parent;
        }
        Ok(())
    }

    /// Forget `branch` entirely
    pub fn untrack(&self, branch: &str) -> Result<()> {
        if !self.store.exists(branch) {
            return Err(StaxError::branch(format!("'{branch}' is not tracked")));
        }
        self.store.remove(branch)?;
        info!("Stopped tracking '{}'", branch);
        Ok(())
    }

    /// Tombstone `branch`; its children get reparented on the next restack
    pub fn mark_deleted(&self, branch: &str) -> Result<BranchMetadata> {
        if !self.store.exists(branch) {
            return Err(StaxError::branch(format!("'{branch}' is not tracked")));
        }
        self.store.update(branch, |m| m.mark_deleted(Utc::now()))
    }

    /// Fetch pull request state for `branches` with at most `width`
    /// requests in flight, then record the results.
    pub async fn refresh_remote_status(
        &self,
        provider: Arc<dyn StatusProvider>,
        branches: Vec<String>,
        width: usize,
    ) -> Result<RefreshSummary> {
        info!(
            "Refreshing {} branch(es) from {}",
            branches.len(),
            provider.name()
        );

        let fetched = worker_pool::run_bounded(branches, width, |branch: String| {
            let provider = provider.clone();
            async move {
                let status = provider.fetch_status(&branch).await?;
                Ok::<_, StaxError>((branch, status))
            }
        })
        .await?;

        self.store.reload()?;
        let mut summary = RefreshSummary::default();
        for (branch, status) in fetched {
            let Some(pr) = status else {
                debug!("No pull request for '{}'", branch);
                continue;
            };
            let inferred = self.record_status(&branch, pr)?;
            if inferred {
                summary.parents_inferred.push(branch.clone());
            }
            summary.updated.push(branch);
        }
        Ok(summary)
    }

    /// Store `pr` on `branch`; returns whether the parent was inferred from it
    fn record_status(&self, branch: &str, pr: PullRequestMetadata) -> Result<bool> {
        let current = self.store.get(branch);
        let base_is_local = current.parent.is_empty()
            && !pr.base_ref.is_empty()
            && pr.base_ref != branch
            && self.vcs.branch_exists(&pr.base_ref);

        if current.parent.is_empty() && !base_is_local && !pr.base_ref.is_empty() {
            warn!(
                "Pull request for '{}' targets '{}', which is not a local branch",
                branch, pr.base_ref
            );
        }

        let branch_point = if base_is_local {
            match self.vcs.merge_base(branch, &pr.base_ref) {
                Ok(commit) => Some(commit),
                Err(e) => {
                    warn!(
                        "Not stacking '{}' on '{}': no branch point found ({})",
                        branch, pr.base_ref, e
                    );
                    None
                }
            }
        } else {
            None
        };
        let infer_parent = branch_point.is_some();

        self.store.update(branch, |m| {
            if infer_parent {
                m.parent = pr.base_ref.clone();
                if let Some(commit) = branch_point {
                    m.branch_point = commit;
                }
                if m.created.is_none() {
                    m.created = Some(Utc::now());
                }
            }
            m.pull_request = pr;
        })?;
        Ok(infer_parent)
    }
}
