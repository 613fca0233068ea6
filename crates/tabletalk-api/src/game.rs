use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use tabletalk_db::GameError;
use tabletalk_types::api::Claims;
use tabletalk_types::models::{Capability, GameAction};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::require_capability;

pub async fn get_game(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = blocking(&state, |db| db.game_session()).await?;
    Ok(Json(session))
}

/// POST /game/{action}: start, pause, resume or end the game.
pub async fn game_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ControlGame)?;
    let action = action.parse::<GameAction>().map_err(GameError::from)?;
    let session = blocking(&state, move |db| db.apply_game_action(action, chrono::Utc::now())).await?;
    Ok(Json(session))
}

/// POST /game/reset: clear messages and challenges for a new round.
pub async fn reset_game(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ControlGame)?;
    blocking(&state, |db| db.reset_game()).await?;
    Ok(StatusCode::NO_CONTENT)
}
