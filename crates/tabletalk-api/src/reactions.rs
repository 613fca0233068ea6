use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use tabletalk_db::GameError;
use tabletalk_types::api::{Claims, ToggleReactionRequest};
use tabletalk_types::models::ReactionKind;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::caller_table;

/// POST /messages/{message_id}/reactions: add, switch or remove the caller table's reaction.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let table_id = caller_table(&claims)?;
    let kind = req.kind.parse::<ReactionKind>().map_err(GameError::from)?;

    let reaction = blocking(&state, move |db| db.toggle_reaction(message_id, &table_id, kind)).await?;
    Ok(Json(reaction))
}
