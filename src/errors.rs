/// Stax Error Types
#[derive(Debug, thiserror::Error)]
pub enum StaxError {
    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Branch management errors
    #[error("Branch error: {0}")]
    Branch(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Parent chains that would loop back on themselves
    #[error("Dependency graph error: {0}")]
    Graph(String),

    /// Remote status provider errors
    #[error("Provider error: {0}")]
    Provider(String),

    /// A replay stopped on conflicts; a checkpoint was written
    #[error(
        "Conflict while rebasing '{branch}' onto '{parent}': {detail}\n\
         Fix conflicts and run `stax continue`, or `stax abort` to stop"
    )]
    Conflict {
        branch: String,
        parent: String,
        detail: String,
    },

    /// Replay failed for a reason other than conflicts; nothing to resume
    #[error("Rebase error: {0}")]
    Rebase(String),

    /// A checkpoint from an earlier run is still on disk
    #[error(
        "A restack operation is already in progress\n\
         Run `stax continue` to resume it or `stax abort` to cancel it"
    )]
    RestackInProgress,

    /// Continue/abort requested without a checkpoint
    #[error("No restack operation in progress")]
    NoRestackInProgress,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl StaxError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        StaxError::Config(msg.into())
    }

    pub fn branch<S: Into<String>>(msg: S) -> Self {
        StaxError::Branch(msg.into())
    }

    pub fn graph<S: Into<String>>(msg: S) -> Self {
        StaxError::Graph(msg.into())
    }

    pub fn provider<S: Into<String>>(msg: S) -> Self {
        StaxError::Provider(msg.into())
    }

    pub fn rebase<S: Into<String>>(msg: S) -> Self {
        StaxError::Rebase(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        StaxError::Validation(msg.into())
    }

    pub fn conflict<S: Into<String>>(branch: S, parent: S, detail: S) -> Self {
        StaxError::Conflict {
            branch: branch.into(),
            parent: parent.into(),
            detail: detail.into(),
        }
    }

    pub fn bitbucket_api(status: u16, message: String) -> Self {
        StaxError::Provider(format!("Bitbucket API error: {status} - {message}"))
    }

    /// True when the run stopped with a resumable checkpoint on disk.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StaxError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, StaxError>;
