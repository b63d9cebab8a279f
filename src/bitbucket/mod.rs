//! Bitbucket Server access
//!
//! Only the read side stax needs: looking up the pull request opened from a
//! branch so its state can be recorded next to the branch metadata.

pub mod client;
pub mod pull_request;

pub use client::BitbucketClient;
pub use pull_request::{PullRequest, PullRequestManager, PullRequestRef, PullRequestState};
