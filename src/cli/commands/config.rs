use crate::cli::output::Output;
use crate::cli::ConfigAction;
use crate::config::{config_path, Settings};
use crate::errors::Result;
use crate::git::{get_current_repository, Vcs};

/// Handle configuration commands
pub async fn run(action: ConfigAction) -> Result<()> {
    let repo = get_current_repository()?;
    let config_file = config_path(&repo.primary_worktree_path()?);

    match action {
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load_from_file(&config_file)?;
            settings.set_value(&key, &value)?;
            settings.validate()?;
            settings.save_to_file(&config_file)?;
            Output::success(format!("Configuration updated: {key} = {}", mask(&key, &value)));
        }
        ConfigAction::Get { key } => {
            let settings = Settings::load_from_file(&config_file)?;
            let value = settings.get_value(&key)?;
            println!("{key} = {}", mask(&key, &value));
        }
    }
    Ok(())
}

fn mask(key: &str, value: &str) -> String {
    if key.contains("token") && !value.is_empty() {
        "*".repeat(8)
    } else {
        value.to_string()
    }
}
