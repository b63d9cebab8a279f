use crate::config::BitbucketConfig;
use crate::errors::{Result, StaxError};
use base64::Engine;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

/// Bitbucket Server API client
pub struct BitbucketClient {
    client: Client,
    base_url: String,
    project_key: String,
    repo_slug: String,
}

impl BitbucketClient {
    /// Create a new Bitbucket client
    pub fn new(config: &BitbucketConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let auth_header = match (&config.username, &config.token) {
            (Some(username), Some(token)) => {
                let auth_string = format!("{username}:{token}");
                let auth_encoded = base64::engine::general_purpose::STANDARD.encode(auth_string);
                format!("Basic {auth_encoded}")
            }
            (None, Some(token)) => format!("Bearer {token}"),
            _ => {
                return Err(StaxError::config(
                    "Bitbucket authentication credentials not configured",
                ))
            }
        };

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header)
                .map_err(|e| StaxError::config(format!("Invalid auth header: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|e| StaxError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            project_key: config.project.clone(),
            repo_slug: config.repo.clone(),
        })
    }

    /// Get the base API URL for this repository
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/rest/api/1.0/projects/{}/repos/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.project_key,
            self.repo_slug,
            path.trim_start_matches('/')
        )
    }

    /// Make a GET request to the Bitbucket API
    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.api_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StaxError::provider(format!("GET request failed: {e}")))?;

        self.handle_response(response).await
    }

    /// Handle HTTP response and deserialize JSON
    async fn handle_response<T>(&self, response: reqwest::Response) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();

        if status.is_success() {
            let text = response.text().await.map_err(|e| {
                StaxError::provider(format!("Failed to read response body: {e}"))
            })?;

            trace!("Response body: {}", text);

            serde_json::from_str(&text).map_err(|e| {
                StaxError::provider(format!("Failed to parse JSON response: {e}"))
            })
        } else {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(StaxError::bitbucket_api(status.as_u16(), text))
        }
    }
}
