use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use tabletalk_db::scoring::{DEFAULT_LEADERBOARD_SIZE, TV_LEADERBOARD_SIZE};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

const MAX_LEADERBOARD_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

/// GET /leaderboard: top tables by points.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let board = blocking(&state, move |db| db.compute_leaderboard(limit)).await?;
    Ok(Json(board))
}

/// GET /leaderboard/tv: the short list for the venue screen.
pub async fn get_tv_leaderboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let board = blocking(&state, |db| db.compute_leaderboard(TV_LEADERBOARD_SIZE)).await?;
    Ok(Json(board))
}
