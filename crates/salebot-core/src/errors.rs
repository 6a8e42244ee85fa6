use crate::domain::PostStatus;

/// Core error type for the sale bot.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can decide between a user-facing message and a logged no-op.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid status transition for post {id}: post is {status}")]
    InvalidTransition { id: i64, status: PostStatus },

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl Error {
    /// Moderator acted on something that is no longer pending.
    pub fn is_stale_moderation(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::InvalidTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
