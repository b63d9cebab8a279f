use crate::cli::commands::CommandContext;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::Vcs;
use crate::stack::{AbortOutcome, MoveEngine, RestackEngine, RestackOutcome};
use console::style;

/// Restack the current stack, or every stack with `all`
pub async fn run(all: bool, dry_run: bool) -> Result<()> {
    let ctx = CommandContext::open()?;
    let engine = RestackEngine::for_repository(&ctx.repo, &ctx.store, ctx.trunk())?;

    let root = if all {
        None
    } else {
        Some(ctx.repo.current_branch()?)
    };

    if dry_run {
        engine.ensure_idle()?;
        let units = engine.plan(root.as_deref())?;
        if units.is_empty() {
            Output::success("Everything is up to date");
            return Ok(());
        }
        Output::section("Would rebase");
        for unit in &units {
            Output::sub_item(format!(
                "{} onto {}",
                style(&unit.branch).cyan(),
                style(&unit.parent).cyan()
            ));
        }
        return Ok(());
    }

    let outcome = engine.restack(root.as_deref())?;
    report(&outcome);
    Ok(())
}

/// Resume an interrupted restack or move
pub async fn continue_run() -> Result<()> {
    let ctx = CommandContext::open()?;
    let engine = RestackEngine::for_repository(&ctx.repo, &ctx.store, ctx.trunk())?;
    let outcome = engine.continue_run()?;
    report(&outcome);
    Ok(())
}

/// Cancel an interrupted restack or move
pub async fn abort() -> Result<()> {
    let ctx = CommandContext::open()?;
    let engine = RestackEngine::for_repository(&ctx.repo, &ctx.store, ctx.trunk())?;
    let AbortOutcome {
        interrupted_branch,
        rebased_branches,
        returned_to,
    } = engine.abort()?;

    Output::success(format!("Aborted restack of '{interrupted_branch}'"));
    if !rebased_branches.is_empty() {
        Output::warning("These branches were already rebased and stay rebased:");
        for branch in &rebased_branches {
            Output::sub_item(branch);
        }
    }
    if let Some(branch) = returned_to {
        Output::info(format!("Switched back to '{branch}'"));
    }
    Ok(())
}

/// Move a branch and its descendants onto `target`
pub async fn move_branch(branch: Option<String>, target: String) -> Result<()> {
    let ctx = CommandContext::open()?;
    let engine = MoveEngine::new(RestackEngine::for_repository(
        &ctx.repo,
        &ctx.store,
        ctx.trunk(),
    )?);
    let outcome = engine.move_branch(branch.as_deref(), &target)?;
    report(&outcome);
    Ok(())
}

fn report(outcome: &RestackOutcome) {
    if outcome.rebased_branches.is_empty() {
        Output::success("Everything is up to date");
        return;
    }

    Output::success(format!(
        "Rebased {} branch(es)",
        outcome.rebased_branches.len()
    ));
    for branch in &outcome.rebased_branches {
        Output::sub_item(branch);
    }

    if !outcome.branches_with_pull_requests.is_empty() {
        Output::tip("These branches have pull requests and need a push:");
        for branch in &outcome.branches_with_pull_requests {
            Output::sub_item(branch);
        }
    }
}
