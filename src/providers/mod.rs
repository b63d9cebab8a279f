pub mod bitbucket;

use crate::config::Settings;
use crate::errors::Result;
use crate::stack::metadata::PullRequestMetadata;
use async_trait::async_trait;
use std::sync::Arc;

pub use bitbucket::BitbucketStatusProvider;

/// Source of remote pull request state for a branch
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Get the provider name for display purposes
    fn name(&self) -> &'static str;

    /// Pull request opened from `branch`, if there is one
    async fn fetch_status(&self, branch: &str) -> Result<Option<PullRequestMetadata>>;
}

/// Provider configured in `settings`, or `None` when no remote is set up
pub fn from_settings(settings: &Settings) -> Result<Option<Arc<dyn StatusProvider>>> {
    if !settings.bitbucket.is_configured() {
        return Ok(None);
    }
    let provider = BitbucketStatusProvider::new(&settings.bitbucket)?;
    Ok(Some(Arc::new(provider)))
}
