//! Shared setup for tests that drive a real git repository.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git in `repo_path`, panicking with stderr on failure
pub fn git(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .expect("Git command should run");

    if !output.status.success() {
        panic!(
            "Git command failed: git {}\nStderr: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Run git and report only whether it succeeded
pub fn git_ok(repo_path: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Create test git repository on `main` with one commit
pub fn create_test_git_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().join("repo");
    std::fs::create_dir(&repo_path).unwrap();

    git(&repo_path, &["init", "--initial-branch=main"]);
    git(&repo_path, &["config", "user.name", "Test User"]);
    git(&repo_path, &["config", "user.email", "test@example.com"]);
    git(&repo_path, &["config", "core.autocrlf", "false"]);
    create_commit(&repo_path, "Initial commit", "README.md", "# Test Repository\n");

    (temp_dir, repo_path)
}

pub fn create_commit(repo_path: &Path, message: &str, filename: &str, content: &str) {
    std::fs::write(repo_path.join(filename), content).unwrap();
    git(repo_path, &["add", filename]);
    git(repo_path, &["commit", "-m", message]);
}

/// Create `branch` from `from` with one commit touching `<branch>.txt`
pub fn create_branch(repo_path: &Path, branch: &str, from: &str) {
    git(repo_path, &["checkout", "--quiet", "-b", branch, from]);
    create_commit(
        repo_path,
        &format!("Add {branch}"),
        &format!("{branch}.txt"),
        &format!("{branch}\n"),
    );
}

pub fn rev_parse(repo_path: &Path, reference: &str) -> String {
    git(repo_path, &["rev-parse", reference])
}

pub fn current_branch(repo_path: &Path) -> String {
    git(repo_path, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// True when `ancestor` is reachable from `descendant`
pub fn is_ancestor(repo_path: &Path, ancestor: &str, descendant: &str) -> bool {
    git_ok(
        repo_path,
        &["merge-base", "--is-ancestor", ancestor, descendant],
    )
}
