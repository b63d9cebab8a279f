pub mod settings;

pub use settings::{BitbucketConfig, GitConfig, Settings, StaxSettings};

use crate::errors::Result;
use std::path::{Path, PathBuf};

/// Directory holding stax state inside the primary working copy
pub const STATE_DIR: &str = ".stax";

/// Branch database: newest name first, then legacy locations still read
pub const BRANCH_DB_FILES: &[&str] = &[".stax/state.json", ".git/.staxstate"];

/// Restack checkpoint: newest name first, then legacy locations still read
pub const RESTACK_STATE_FILES: &[&str] = &[".stax/restack.json", ".git/.staxrestack"];

const CONFIG_FILES: &[&str] = &[".stax/config.json", ".git/stax.json"];

/// Resolve candidate file names against a repository root.
pub fn candidate_paths(repo_root: &Path, names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|name| repo_root.join(name)).collect()
}

/// First existing candidate, else the newest name
pub fn resolve_existing(repo_root: &Path, names: &[&str]) -> PathBuf {
    candidate_paths(repo_root, names)
        .into_iter()
        .find(|path| path.exists())
        .unwrap_or_else(|| repo_root.join(names[0]))
}

/// Location new settings are written to
pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_FILES[0])
}

/// Load repository settings, honouring the legacy location when present
pub fn load_settings(repo_root: &Path) -> Result<Settings> {
    let settings = Settings::load_from_file(&resolve_existing(repo_root, CONFIG_FILES))?;
    settings.validate()?;
    Ok(settings)
}
