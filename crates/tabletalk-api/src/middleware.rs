use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use tabletalk_types::api::Claims;
use tabletalk_types::models::{Capability, Role, has_capability};

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

pub(crate) fn require_capability(claims: &Claims, capability: Capability) -> Result<(), ApiError> {
    if has_capability(claims.role, capability) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// The caller's table, for endpoints only attendees may use.
pub(crate) fn caller_table(claims: &Claims) -> Result<String, ApiError> {
    match (claims.role, &claims.table_id) {
        (Role::Table, Some(table_id)) => Ok(table_id.clone()),
        _ => Err(ApiError::Forbidden),
    }
}

/// The caller's presence id, for attendee tokens.
pub(crate) fn caller_user(claims: &Claims) -> Result<Uuid, ApiError> {
    caller_table(claims)?;
    claims.sub.parse().map_err(|_| ApiError::Unauthorized)
}
