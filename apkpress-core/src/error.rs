use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PressError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("HTML error: {0}")]
    Html(#[from] HtmlError),

    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("Article {0} was modified since it was read")]
    Conflict(Uuid),

    #[error("Other error: {0}")]
    Other(String),
}

impl PressError {
    /// Errors worth retrying on a later attempt. Everything else is a
    /// definite answer from the store.
    pub fn is_transient(&self) -> bool {
        match self {
            PressError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            PressError::Io(_) => true,
            _ => false,
        }
    }

    /// Stable snake_case class used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            PressError::Database(_) => "database",
            PressError::Config(_) => "config",
            PressError::Io(_) => "io",
            PressError::Ipc(_) => "ipc",
            PressError::Html(_) => "html",
            PressError::NotFound(_) => "not_found",
            PressError::DuplicateSlug(_) => "duplicate_slug",
            PressError::Conflict(_) => "conflict",
            PressError::Other(_) => "other",
        }
    }
}

/// Failures of the span-preserving tokenizer in [`crate::html`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HtmlError {
    #[error("unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),

    #[error("unterminated comment starting at byte {0}")]
    UnterminatedComment(usize),
}
