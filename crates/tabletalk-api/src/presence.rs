use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use tabletalk_types::api::Claims;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::caller_user;

pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller_user(&claims)?;
    blocking(&state, move |db| db.heartbeat(user_id, chrono::Utc::now())).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller_user(&claims)?;
    blocking(&state, move |db| db.leave(user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /tables/{table_id}/presence: who is currently at a table.
pub async fn list_presence(
    State(state): State<AppState>,
    Path(table_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(&state, move |db| db.list_presence(&table_id, chrono::Utc::now())).await?;
    Ok(Json(users))
}
