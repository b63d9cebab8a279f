use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything stax remembers about one tracked branch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchMetadata {
    /// Branch name; the database key, so never written inside the value
    #[serde(skip)]
    pub name: String,
    /// Branch this one stacks on; empty for trunk and untracked branches
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    /// Commit id the branch diverged from `parent` at, as of the last restack
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch_point: String,
    /// When stax first saw the branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Set once the branch is known to be gone from git
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "PullRequestMetadata::is_empty")]
    pub pull_request: PullRequestMetadata,
}

/// Pull request details as reported by the status provider.
///
/// Only `base_ref` is ever read back (to infer a missing parent); the rest is
/// carried through for display and for fields this version does not know.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_ref: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PullRequestMetadata {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.state.is_empty() && self.url.is_empty() && self.extra.is_empty()
    }
}

impl BranchMetadata {
    /// Zero-value record for a branch the database does not know about
    pub fn untracked(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_tracked(&self) -> bool {
        !self.parent.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    pub fn has_pull_request(&self) -> bool {
        !self.pull_request.id.is_empty()
    }

    /// Tombstone the entry; keeps the first deletion time
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        if self.deleted.is_none() {
            self.deleted = Some(at);
        }
    }
}
