use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Discord API error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No review channel configured or found for guild {0}")]
    NoReviewChannel(u64),

    #[error("Sanction could not be applied: {0}")]
    Execution(String),

    #[error("Malformed persisted state: {0}")]
    MalformedState(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Error::Custom(msg.into())
    }

    /// Wrap a platform failure as an execution error
    pub fn execution<E: std::fmt::Display>(source: E) -> Self {
        Error::Execution(source.to_string())
    }
}
