use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy shared by every service and store. Each variant maps to a
/// distinct HTTP status in `http::error`, so callers can branch on the kind
/// without string-matching messages.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or self-referential input.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The actor lacks rights over the target record.
    #[error("{0}")]
    Forbidden(String),

    /// The referenced entity does not exist (or is hidden from the viewer).
    #[error("{0}")]
    NotFound(String),

    /// Duplicate edge or request, or an already-blocked pair.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
