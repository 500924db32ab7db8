use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Invalid issue id: {0}")]
    InvalidIssueId(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Nothing to commit on branch {0}")]
    NothingToCommit(String),

    #[error("Cherry-pick failed: {0}")]
    CherryPick(String),

    #[error("Editor error: {0}")]
    Editor(String),

    #[error("Ticket API error: {0}")]
    TicketApi(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<git2::Error> for AppError {
    fn from(e: git2::Error) -> Self {
        AppError::Git(e.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
