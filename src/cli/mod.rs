pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stax")]
#[command(about = "Stacked branches that follow their parents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebase the current stack onto its updated parents
    Restack {
        /// Restack every tracked stack instead of the current one
        #[arg(long)]
        all: bool,

        /// Show the rebases that would run without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Resume a restack or move after resolving conflicts
    Continue,

    /// Cancel an interrupted restack or move
    Abort,

    /// Move a branch and its descendants onto another branch
    Move {
        /// New parent branch
        target: String,

        /// Branch to move (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Track a branch on top of a parent
    Add {
        /// Branch to track
        branch: String,

        /// Parent branch
        #[arg(long)]
        parent: String,

        /// Commit the branch diverged at (defaults to the merge base)
        #[arg(long)]
        branch_point: Option<String>,
    },

    /// Refresh pull request state from the configured remote
    Refresh,

    /// Forget branches that have been deleted from git
    Prune {
        /// List what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., bitbucket.url)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        self.setup_logging();

        match self.command {
            Commands::Restack { all, dry_run } => commands::restack::run(all, dry_run).await,
            Commands::Continue => commands::restack::continue_run().await,
            Commands::Abort => commands::restack::abort().await,
            Commands::Move { target, branch } => {
                commands::restack::move_branch(branch, target).await
            }
            Commands::Add {
                branch,
                parent,
                branch_point,
            } => commands::branch::add(branch, parent, branch_point).await,
            Commands::Refresh => commands::branch::refresh().await,
            Commands::Prune { dry_run } => commands::branch::prune(dry_run).await,
            Commands::Config { action } => commands::config::run(action).await,
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
