use crate::errors::{Result, StaxError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bitbucket: BitbucketConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub stax: StaxSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketConfig {
    pub url: String,
    pub project: String,
    pub repo: String,
    pub username: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Branch every stack ultimately sits on
    pub trunk_branch: String,
    pub remote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaxSettings {
    /// Concurrent requests when refreshing pull request status
    pub worker_pool_width: usize,
    /// Entries for branches gone from git are pruned after this many days
    pub prune_after_days: i64,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            project: String::new(),
            repo: String::new(),
            username: None,
            token: None,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            trunk_branch: "main".to_string(),
            remote: "origin".to_string(),
        }
    }
}

impl Default for StaxSettings {
    fn default() -> Self {
        Self {
            worker_pool_width: 5,
            prune_after_days: 7,
        }
    }
}

impl BitbucketConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.project.is_empty() && !self.repo.is_empty()
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| StaxError::config(format!("Failed to read config file: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| StaxError::config(format!("Failed to parse config file: {e}")))
    }

    /// Save settings to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        crate::utils::atomic_file::write_json(path, self)
    }

    /// Update a configuration value by dotted key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = split_key(key)?;

        match (section, field) {
            ("bitbucket", "url") => self.bitbucket.url = value.to_string(),
            ("bitbucket", "project") => self.bitbucket.project = value.to_string(),
            ("bitbucket", "repo") => self.bitbucket.repo = value.to_string(),
            ("bitbucket", "username") => self.bitbucket.username = Some(value.to_string()),
            ("bitbucket", "token") => self.bitbucket.token = Some(value.to_string()),
            ("git", "trunk_branch") => self.git.trunk_branch = value.to_string(),
            ("git", "remote") => self.git.remote = value.to_string(),
            ("stax", "worker_pool_width") => {
                self.stax.worker_pool_width = value
                    .parse()
                    .map_err(|_| StaxError::config(format!("Invalid number: {value}")))?;
            }
            ("stax", "prune_after_days") => {
                self.stax.prune_after_days = value
                    .parse()
                    .map_err(|_| StaxError::config(format!("Invalid number: {value}")))?;
            }
            _ => return Err(StaxError::config(format!("Unknown config key: {key}"))),
        }

        Ok(())
    }

    /// Get a configuration value by dotted key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let (section, field) = split_key(key)?;

        let value = match (section, field) {
            ("bitbucket", "url") => self.bitbucket.url.clone(),
            ("bitbucket", "project") => self.bitbucket.project.clone(),
            ("bitbucket", "repo") => self.bitbucket.repo.clone(),
            ("bitbucket", "username") => self.bitbucket.username.clone().unwrap_or_default(),
            ("bitbucket", "token") => self.bitbucket.token.clone().unwrap_or_default(),
            ("git", "trunk_branch") => self.git.trunk_branch.clone(),
            ("git", "remote") => self.git.remote.clone(),
            ("stax", "worker_pool_width") => self.stax.worker_pool_width.to_string(),
            ("stax", "prune_after_days") => self.stax.prune_after_days.to_string(),
            _ => return Err(StaxError::config(format!("Unknown config key: {key}"))),
        };

        Ok(value)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.bitbucket.url.is_empty()
            && !self.bitbucket.url.starts_with("http://")
            && !self.bitbucket.url.starts_with("https://")
        {
            return Err(StaxError::config(
                "Bitbucket URL must start with http:// or https://",
            ));
        }

        if self.git.trunk_branch.trim().is_empty() {
            return Err(StaxError::config("Trunk branch cannot be empty"));
        }

        if self.stax.worker_pool_width == 0 {
            return Err(StaxError::config("Worker pool width must be at least 1"));
        }

        if self.stax.prune_after_days < 0 {
            return Err(StaxError::config("Prune age cannot be negative"));
        }

        Ok(())
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    key.split_once('.')
        .filter(|(section, field)| !section.is_empty() && !field.contains('.'))
        .ok_or_else(|| StaxError::config(format!("Invalid config key format: {key}")))
}
