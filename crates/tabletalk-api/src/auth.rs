use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};

use tabletalk_db::{Database, GameError};
use tabletalk_types::api::{
    Claims, DashboardLoginRequest, DashboardLoginResponse, JoinTableRequest, JoinTableResponse,
};
use tabletalk_types::models::Role;

use crate::blocking;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub admin_code: String,
    pub staff_code: String,
}

impl AppStateInner {
    /// Codes table join codes must not collide with.
    pub fn reserved_codes(&self) -> [&str; 2] {
        [self.admin_code.as_str(), self.staff_code.as_str()]
    }
}

const TOKEN_TTL_HOURS: i64 = 12;

/// POST /auth/join: join a table with its code and get a table token.
pub async fn join_table(
    State(state): State<AppState>,
    Json(req): Json<JoinTableRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |db| {
        db.join_table(
            &req.table_id,
            &req.join_code,
            &req.first_name,
            &req.last_name,
            chrono::Utc::now(),
        )
    })
    .await?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: Role::Table,
        table_id: Some(user.table_id.clone()),
        name: format!("{} {}", user.first_name, user.last_name),
        exp: expiry(),
    };
    let token = create_token(&state.jwt_secret, &claims)?;

    Ok((
        StatusCode::CREATED,
        Json(JoinTableResponse {
            user_id: user.id,
            table_id: user.table_id,
            token,
        }),
    ))
}

/// POST /auth/dashboard: exchange the admin or staff code for a dashboard token.
pub async fn dashboard_login(
    State(state): State<AppState>,
    Json(req): Json<DashboardLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let code = req.code.trim();
    let role = if code == state.admin_code {
        Role::Admin
    } else if code == state.staff_code {
        Role::Staff
    } else {
        warn!("Rejected dashboard login");
        return Err(ApiError::Unauthorized);
    };

    let name = match role {
        Role::Admin => "admin",
        _ => "staff",
    };
    let claims = Claims {
        sub: name.to_string(),
        role,
        table_id: None,
        name: name.to_string(),
        exp: expiry(),
    };
    let token = create_token(&state.jwt_secret, &claims)?;
    info!("Dashboard login as {}", name);

    Ok(Json(DashboardLoginResponse { role, token }))
}

fn expiry() -> usize {
    (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize
}

pub(crate) fn create_token(secret: &str, claims: &Claims) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Game(GameError::Internal(format!("token encoding failed: {}", e))))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::router;
    use crate::test_util::{call, dashboard_token, state};

    #[tokio::test]
    async fn join_with_wrong_code_is_unauthorized() {
        let app = router(state());
        let admin = dashboard_token(&app, "ADMIN-CODE").await;
        let (status, _) = call(&app, "POST", "/tables", Some(&admin), Some(json!({ "id": "A1" }))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            &app,
            "POST",
            "/auth/join",
            None,
            Some(json!({
                "table_id": "A1",
                "join_code": "WRONG1",
                "first_name": "Ada",
                "last_name": "Guest",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("join code"));

        let (status, _) = call(&app, "POST", "/auth/dashboard", None, Some(json!({ "code": "nope" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
