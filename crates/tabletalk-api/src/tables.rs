use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use tabletalk_types::api::{Claims, CreateTableRequest};
use tabletalk_types::models::Capability;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::require_capability;

/// POST /tables: register a table and hand out its join code.
pub async fn create_table(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTableRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ManageTables)?;
    let st = state.clone();
    let table = blocking(&state, move |db| {
        db.create_table(&req.id, &st.reserved_codes(), chrono::Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(table)))
}

pub async fn list_tables(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ManageTables)?;
    let tables = blocking(&state, |db| db.list_tables(chrono::Utc::now())).await?;
    Ok(Json(tables))
}

/// DELETE /tables/{table_id}: removes the table and everyone at it.
pub async fn delete_table(
    State(state): State<AppState>,
    Path(table_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ManageTables)?;
    blocking(&state, move |db| db.delete_table(&table_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /tables/{table_id}/badges
pub async fn get_badges(
    State(state): State<AppState>,
    Path(table_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let badges = blocking(&state, move |db| db.table_badges(&table_id)).await?;
    Ok(Json(badges))
}
