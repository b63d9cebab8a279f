use crate::bitbucket::{BitbucketClient, PullRequestManager};
use crate::config::BitbucketConfig;
use crate::errors::Result;
use crate::providers::StatusProvider;
use crate::stack::metadata::PullRequestMetadata;
use async_trait::async_trait;
use tracing::debug;

/// Bitbucket Server implementation of [`StatusProvider`]
pub struct BitbucketStatusProvider {
    pr_manager: PullRequestManager,
}

impl BitbucketStatusProvider {
    pub fn new(config: &BitbucketConfig) -> Result<Self> {
        let client = BitbucketClient::new(config)?;
        Ok(Self {
            pr_manager: PullRequestManager::new(client),
        })
    }
}

#[async_trait]
impl StatusProvider for BitbucketStatusProvider {
    fn name(&self) -> &'static str {
        "Bitbucket Server"
    }

    async fn fetch_status(&self, branch: &str) -> Result<Option<PullRequestMetadata>> {
        let pr = self.pr_manager.find_for_branch(branch).await?;
        debug!(
            "{}: '{}' -> {:?}",
            self.name(),
            branch,
            pr.as_ref().map(|p| p.id)
        );
        Ok(pr.map(PullRequestMetadata::from))
    }
}
