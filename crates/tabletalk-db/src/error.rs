use tabletalk_types::ParseEnumError;
use thiserror::Error;

/// Failure kinds the core reports to its callers. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum GameError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A join code or similar credential did not match.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The request is well-formed but conflicts with the current state.
    #[error("conflict: {0}")]
    StateConflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }
}

impl From<rusqlite::Error> for GameError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for GameError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<ParseEnumError> for GameError {
    fn from(e: ParseEnumError) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
