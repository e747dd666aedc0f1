//! Errors returned by engine operations.

use db::DbError;

/// Error type for engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Render service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => EngineError::NotFound(what),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<ractor::SpawnErr> for EngineError {
    fn from(err: ractor::SpawnErr) -> Self {
        EngineError::Internal(format!("failed to spawn worker: {}", err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
