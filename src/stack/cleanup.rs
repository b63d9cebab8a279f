use crate::errors::Result;
use crate::git::Vcs;
use crate::stack::store::BranchStore;
use chrono::{Duration, Utc};
use tracing::{debug, info};

/// Drop database entries for branches that have been gone from git for a while.
///
/// An entry qualifies when its branch no longer exists and it was tombstoned
/// more than `older_than_days` days ago. Missing branches without a tombstone
/// get one now, so a later pass can remove them. With `dry_run` nothing is
/// written. Returns the qualifying names, sorted.
pub fn prune_missing_branches<V: Vcs>(
    store: &BranchStore,
    vcs: &V,
    older_than_days: i64,
    dry_run: bool,
) -> Result<Vec<String>> {
    store.reload()?;
    let now = Utc::now();
    let cutoff = now - Duration::days(older_than_days.max(0));

    let missing: Vec<_> = store
        .snapshot()
        .into_iter()
        .filter(|meta| !meta.name.is_empty())
        .filter(|meta| !vcs.branch_exists(&meta.name))
        .collect();

    let mut candidates = Vec::new();
    for meta in missing {
        match meta.deleted {
            Some(deleted) if deleted < cutoff => candidates.push(meta.name),
            Some(_) => debug!("'{}' was deleted recently, keeping it", meta.name),
            None if dry_run => debug!("'{}' is missing from git", meta.name),
            None => {
                debug!("Tombstoning '{}', which is missing from git", meta.name);
                store.update(&meta.name, |m| m.mark_deleted(now))?;
            }
        }
    }
    candidates.sort();

    if candidates.is_empty() {
        debug!("Nothing to prune");
        return Ok(candidates);
    }

    if dry_run {
        info!("Would prune {} branch(es)", candidates.len());
        return Ok(candidates);
    }

    let removed = store.remove_many(&candidates)?;
    info!("Pruned {} branch(es) missing from git", removed);
    Ok(candidates)
}
