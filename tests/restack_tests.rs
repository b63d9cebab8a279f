//! Restack, continue and abort against real git repositories.

#[path = "integration/test_helpers.rs"]
mod test_helpers;

use stax::git::{GitRepository, Vcs};
use stax::stack::{BranchStore, RestackEngine, RestackStateFile, StackManager};
use stax::StaxError;
use std::path::Path;
use test_helpers::*;

fn track(repo: &GitRepository, store: &BranchStore, branch: &str, parent: &str) {
    StackManager::new(repo, store, "main")
        .track_branch(branch, parent, None)
        .unwrap();
}

/// main -> a -> b, then a new commit on main
fn stacked_repo() -> (tempfile::TempDir, std::path::PathBuf) {
    let (temp_dir, repo_path) = create_test_git_repo();
    create_branch(&repo_path, "a", "main");
    create_branch(&repo_path, "b", "a");
    git(&repo_path, &["checkout", "--quiet", "main"]);
    create_commit(&repo_path, "Main moves on", "main.txt", "main\n");
    (temp_dir, repo_path)
}

fn checkpoint_exists(repo_path: &Path) -> bool {
    RestackStateFile::new(repo_path).exists()
}

#[test]
fn test_restack_chain_onto_new_trunk_commit() {
    let (_temp_dir, repo_path) = stacked_repo();
    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");
    track(&repo, &store, "b", "a");

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    assert_eq!(engine.plan(None).unwrap().len(), 1);

    let outcome = engine.restack(None).unwrap();

    assert_eq!(outcome.rebased_branches, vec!["a", "b"]);
    assert!(is_ancestor(&repo_path, "main", "a"));
    assert!(is_ancestor(&repo_path, "a", "b"));
    assert_eq!(store.get("a").branch_point, rev_parse(&repo_path, "main"));
    assert_eq!(store.get("b").branch_point, rev_parse(&repo_path, "a"));
    assert!(!checkpoint_exists(&repo_path));
    assert_eq!(current_branch(&repo_path), "main");

    // Nothing left to do the second time round
    let again = engine.restack(None).unwrap();
    assert!(again.rebased_branches.is_empty());
}

#[test]
fn test_restack_scoped_to_branch_leaves_siblings_alone() {
    let (_temp_dir, repo_path) = create_test_git_repo();
    create_branch(&repo_path, "a", "main");
    create_branch(&repo_path, "b", "a");
    create_branch(&repo_path, "other", "main");
    git(&repo_path, &["checkout", "--quiet", "main"]);
    create_commit(&repo_path, "Main moves on", "main.txt", "main\n");

    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");
    track(&repo, &store, "b", "a");
    track(&repo, &store, "other", "main");
    let other_tip = rev_parse(&repo_path, "other");

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    let outcome = engine.restack(Some("a")).unwrap();

    assert_eq!(outcome.rebased_branches, vec!["a", "b"]);
    assert_eq!(rev_parse(&repo_path, "other"), other_tip);
    assert!(!is_ancestor(&repo_path, "main", "other"));
}

#[test]
fn test_child_of_deleted_branch_moves_to_grandparent() {
    let (_temp_dir, repo_path) = create_test_git_repo();
    create_branch(&repo_path, "a", "main");
    create_branch(&repo_path, "b", "a");
    git(&repo_path, &["checkout", "--quiet", "main"]);

    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");
    track(&repo, &store, "b", "a");

    git(&repo_path, &["branch", "-D", "a"]);

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    let outcome = engine.restack(None).unwrap();

    assert_eq!(outcome.rebased_branches, vec!["b"]);
    assert_eq!(store.get("b").parent, "main");
    assert_eq!(store.get("b").branch_point, rev_parse(&repo_path, "main"));
    // Only b's own commit was carried over
    assert!(!git_ok(&repo_path, &["cat-file", "-e", "b:a.txt"]));
    assert!(git_ok(&repo_path, &["cat-file", "-e", "b:b.txt"]));
}

/// main and a both add `shared.txt` with different contents
fn conflicting_repo() -> (tempfile::TempDir, std::path::PathBuf) {
    let (temp_dir, repo_path) = create_test_git_repo();
    git(&repo_path, &["checkout", "--quiet", "-b", "a"]);
    create_commit(&repo_path, "a edits shared", "shared.txt", "from a\n");
    create_branch(&repo_path, "b", "a");
    git(&repo_path, &["checkout", "--quiet", "main"]);
    create_commit(&repo_path, "main edits shared", "shared.txt", "from main\n");
    (temp_dir, repo_path)
}

#[test]
fn test_conflict_then_continue() {
    let (_temp_dir, repo_path) = conflicting_repo();
    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");
    track(&repo, &store, "b", "a");

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    let err = engine.restack(None).unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");
    assert!(checkpoint_exists(&repo_path));
    assert!(repo.is_replay_in_progress("a").unwrap());

    // Nothing new may start while paused
    assert!(matches!(
        engine.restack(None),
        Err(StaxError::RestackInProgress)
    ));

    std::fs::write(repo_path.join("shared.txt"), "resolved\n").unwrap();
    git(&repo_path, &["add", "shared.txt"]);

    let outcome = engine.continue_run().unwrap();

    assert_eq!(outcome.rebased_branches, vec!["a", "b"]);
    assert!(is_ancestor(&repo_path, "main", "a"));
    assert!(is_ancestor(&repo_path, "a", "b"));
    assert!(!checkpoint_exists(&repo_path));
    assert!(!repo.is_replay_in_progress("a").unwrap());
    assert_eq!(current_branch(&repo_path), "main");
}

#[test]
fn test_conflict_then_abort() {
    let (_temp_dir, repo_path) = conflicting_repo();
    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");
    track(&repo, &store, "b", "a");
    let a_before = rev_parse(&repo_path, "a");

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    assert!(engine.restack(None).unwrap_err().is_conflict());

    let outcome = engine.abort().unwrap();

    assert_eq!(outcome.interrupted_branch, "a");
    assert!(outcome.rebased_branches.is_empty());
    assert_eq!(rev_parse(&repo_path, "a"), a_before);
    assert!(!checkpoint_exists(&repo_path));
    assert!(!repo.is_replay_in_progress("a").unwrap());
    assert_eq!(current_branch(&repo_path), "main");

    assert!(matches!(
        engine.abort(),
        Err(StaxError::NoRestackInProgress)
    ));
}

#[test]
fn test_continue_after_rebase_aborted_by_hand() {
    let (_temp_dir, repo_path) = conflicting_repo();
    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    assert!(engine.restack(None).unwrap_err().is_conflict());

    git(&repo_path, &["rebase", "--abort"]);

    let err = engine.continue_run().unwrap_err();
    assert!(err.to_string().contains("aborted"), "unexpected error: {err}");
    assert!(checkpoint_exists(&repo_path));

    engine.abort().unwrap();
    assert!(!checkpoint_exists(&repo_path));
}

#[test]
fn test_dirty_tree_fails_without_checkpoint() {
    let (_temp_dir, repo_path) = stacked_repo();
    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");
    let a_before = rev_parse(&repo_path, "a");

    std::fs::write(repo_path.join("README.md"), "uncommitted\n").unwrap();

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    let err = engine.restack(None).unwrap_err();

    assert!(!err.is_conflict(), "unexpected conflict: {err}");
    assert!(!checkpoint_exists(&repo_path));
    assert_eq!(rev_parse(&repo_path, "a"), a_before);
}

#[test]
fn test_branch_checked_out_in_linked_worktree_is_rebased_there() {
    let (temp_dir, repo_path) = stacked_repo();
    let linked = temp_dir.path().join("linked");
    git(
        &repo_path,
        &["worktree", "add", linked.to_str().unwrap(), "a"],
    );

    let repo = GitRepository::open(&repo_path).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    let outcome = engine.restack(None).unwrap();

    assert_eq!(outcome.rebased_branches, vec!["a"]);
    assert!(is_ancestor(&repo_path, "main", "a"));
    assert_eq!(current_branch(&linked), "a");
    assert_eq!(current_branch(&repo_path), "main");
}

#[test]
fn test_run_from_linked_worktree_leaves_primary_checkout_alone() {
    let (temp_dir, repo_path) = create_test_git_repo();
    create_branch(&repo_path, "a", "main");
    git(&repo_path, &["checkout", "--quiet", "main"]);
    create_commit(&repo_path, "Main moves on", "main.txt", "main\n");
    std::fs::write(repo_path.join("README.md"), "work in progress\n").unwrap();

    let linked = temp_dir.path().join("linked");
    git(
        &repo_path,
        &["worktree", "add", "-b", "wt", linked.to_str().unwrap(), "main"],
    );

    let repo = GitRepository::open(&linked).unwrap();
    let store = BranchStore::open(&repo_path).unwrap();
    track(&repo, &store, "a", "main");

    let engine = RestackEngine::for_repository(&repo, &store, "main").unwrap();
    let outcome = engine.restack(None).unwrap();

    assert_eq!(outcome.rebased_branches, vec!["a"]);
    assert!(is_ancestor(&repo_path, "main", "a"));
    assert_eq!(current_branch(&linked), "wt");
    assert_eq!(current_branch(&repo_path), "main");
    assert_eq!(
        std::fs::read_to_string(repo_path.join("README.md")).unwrap(),
        "work in progress\n"
    );
    assert!(!checkpoint_exists(&repo_path));
}
