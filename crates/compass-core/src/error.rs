use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing indices are absent or empty. The remedy is to run indexing,
    /// not to retry.
    #[error("Index not ready: {0}")]
    NotReady(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::NotReady(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
