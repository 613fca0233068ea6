use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use tabletalk_db::messages::NewMessage;
use tabletalk_types::api::{BroadcastRequest, Claims, SendMessageRequest, SendMessageResponse};
use tabletalk_types::models::Capability;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::{caller_table, require_capability};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// POST /messages: send a message from the caller's table.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let from_table = caller_table(&claims)?;
    let msg = NewMessage {
        content: req.content,
        from_table,
        to_table: req.to_table,
        sender_name: claims.name,
        is_anonymous: req.is_anonymous,
    };

    let id = blocking(&state, move |db| db.send_message(msg, chrono::Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(SendMessageResponse { id })))
}

/// POST /broadcasts: message every table at once.
pub async fn send_broadcast(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::SendBroadcast)?;
    let id = blocking(&state, move |db| {
        db.send_broadcast(&req.content, &claims.name, chrono::Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(SendMessageResponse { id })))
}

/// GET /messages/inbox: messages to the caller's table plus broadcasts.
pub async fn get_inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let table_id = caller_table(&claims)?;
    let messages = blocking(&state, move |db| db.table_inbox(&table_id, query.limit)).await?;
    Ok(Json(messages))
}

/// GET /messages/audit: every message with real sender names.
pub async fn get_audit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ViewAudit)?;
    let messages = blocking(&state, move |db| db.audit_messages(query.limit)).await?;
    Ok(Json(messages))
}
