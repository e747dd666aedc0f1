//! Errors surfaced to API callers.

use actors::EngineError;
use db::DbError;

/// Error type for API operations, carrying its protocol status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::BadRequest(_) => 400,
            ApiError::Unavailable(_) => 503,
            ApiError::Internal(_) => 500,
        }
    }

    pub(crate) fn invalid_id(kind: &str, id: &str, err: impl std::fmt::Display) -> Self {
        ApiError::BadRequest(format!("Invalid {} ID {:?}: {}", kind, id, err))
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
            EngineError::InvalidState(msg) => ApiError::Conflict(msg),
            EngineError::InvalidInput(msg) => ApiError::BadRequest(msg),
            EngineError::ServiceUnavailable(msg) => ApiError::Unavailable(msg),
            EngineError::Internal(msg) => {
                tracing::warn!("Internal engine error: {}", msg);
                ApiError::Internal("internal error".into())
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        EngineError::from(err).into()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
