use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use tabletalk_db::GameError;

/// Everything a handler can fail with. Game errors keep their kind so callers
/// can tell bad input from missing entities from state conflicts.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("authentication required")]
    Unauthorized,
    #[error("not allowed for this role")]
    Forbidden,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Game(GameError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Game(GameError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Game(GameError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            Self::Game(GameError::StateConflict(_)) => StatusCode::CONFLICT,
            Self::Game(GameError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Game(GameError::Internal(detail)) => {
                error!("Internal error: {}", detail);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
