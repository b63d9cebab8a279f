use crate::cli::commands::CommandContext;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::providers;
use crate::stack::{cleanup, StackManager};
use console::style;

/// Track `branch` on top of `parent`
pub async fn add(branch: String, parent: String, branch_point: Option<String>) -> Result<()> {
    let ctx = CommandContext::open()?;
    let manager = StackManager::new(&ctx.repo, &ctx.store, ctx.trunk());
    let meta = manager.track_branch(&branch, &parent, branch_point.as_deref())?;

    Output::success(format!(
        "Tracking {} on {}",
        style(&branch).cyan(),
        style(&meta.parent).cyan()
    ));
    Output::sub_item(format!("Branch point: {}", style(&meta.branch_point).dim()));
    Ok(())
}

/// Fetch pull request state for every tracked branch
pub async fn refresh() -> Result<()> {
    let ctx = CommandContext::open()?;
    let Some(provider) = providers::from_settings(&ctx.settings)? else {
        Output::warning("No remote configured");
        Output::tip("Set bitbucket.url, bitbucket.project, bitbucket.repo and bitbucket.token");
        return Ok(());
    };

    let branches: Vec<String> = ctx
        .store
        .snapshot()
        .into_iter()
        .filter(|meta| !meta.is_deleted())
        .map(|meta| meta.name)
        .collect();

    let manager = StackManager::new(&ctx.repo, &ctx.store, ctx.trunk());
    let summary = manager
        .refresh_remote_status(provider, branches, ctx.settings.stax.worker_pool_width)
        .await?;

    Output::success(format!(
        "Updated {} branch(es)",
        summary.updated.len()
    ));
    for branch in &summary.parents_inferred {
        Output::sub_item(format!(
            "{} parent set to {}",
            style(branch).cyan(),
            style(ctx.store.get(branch).parent).cyan()
        ));
    }
    Ok(())
}

/// Remove entries for branches long gone from git
pub async fn prune(dry_run: bool) -> Result<()> {
    let ctx = CommandContext::open()?;
    let days = ctx.settings.stax.prune_after_days;
    let pruned = cleanup::prune_missing_branches(&ctx.store, &ctx.repo, days, dry_run)?;

    if pruned.is_empty() {
        Output::info("Nothing to prune");
        return Ok(());
    }

    if dry_run {
        Output::section("Would prune");
    } else {
        Output::success(format!("Pruned {} branch(es)", pruned.len()));
    }
    for branch in &pruned {
        Output::sub_item(branch);
    }
    Ok(())
}
