use crate::bitbucket::client::BitbucketClient;
use crate::errors::Result;
use crate::stack::metadata::PullRequestMetadata;
use serde::Deserialize;
use tracing::debug;

/// Read-only pull request lookups
pub struct PullRequestManager {
    client: BitbucketClient,
}

impl PullRequestManager {
    pub fn new(client: BitbucketClient) -> Self {
        Self { client }
    }

    /// Most recent pull request opened from `branch`, in any state
    pub async fn find_for_branch(&self, branch: &str) -> Result<Option<PullRequest>> {
        let at: String =
            url::form_urlencoded::byte_serialize(format!("refs/heads/{branch}").as_bytes())
                .collect();
        let path = format!("pull-requests?at={at}&direction=OUTGOING&state=ALL&order=NEWEST&limit=1");

        let page: PullRequestPage = self.client.get(&path).await?;
        debug!(
            "Found {} pull request(s) for '{}'",
            page.values.len(),
            branch
        );
        Ok(page.values.into_iter().next())
    }
}

/// One page of a pull request listing
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPage {
    #[serde(default)]
    pub values: Vec<PullRequest>,
    #[serde(rename = "isLastPage", default)]
    pub is_last_page: bool,
}

/// The parts of a Bitbucket pull request stax records
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub state: PullRequestState,
    #[serde(default)]
    pub draft: bool,
    #[serde(rename = "fromRef")]
    pub from_ref: PullRequestRef,
    #[serde(rename = "toRef")]
    pub to_ref: PullRequestRef,
    #[serde(default)]
    pub links: Option<PullRequestLinks>,
}

/// Pull request reference (branch information)
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    pub id: String,
    #[serde(rename = "displayId")]
    pub display_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestLinks {
    #[serde(rename = "self", default)]
    pub self_link: Vec<SelfLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelfLink {
    pub href: String,
}

/// Pull request state
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestState {
    Open,
    Merged,
    Declined,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Declined => "DECLINED",
        }
    }
}

impl PullRequest {
    pub fn web_url(&self) -> Option<&str> {
        self.links
            .as_ref()?
            .self_link
            .first()
            .map(|link| link.href.as_str())
    }
}

impl From<PullRequest> for PullRequestMetadata {
    fn from(pr: PullRequest) -> Self {
        let mut extra = serde_json::Map::new();
        if !pr.title.is_empty() {
            extra.insert("title".to_string(), serde_json::Value::String(pr.title.clone()));
        }

        Self {
            id: pr.id.to_string(),
            state: pr.state.as_str().to_string(),
            url: pr.web_url().unwrap_or_default().to_string(),
            is_draft: pr.draft,
            base_ref: pr.to_ref.display_id,
            extra,
        }
    }
}
