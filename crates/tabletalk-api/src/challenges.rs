use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use tabletalk_db::GameError;
use tabletalk_db::challenges::NewChallenge;
use tabletalk_types::api::{Claims, CreateChallengeRequest, EndChallengeResponse};
use tabletalk_types::models::{Capability, ScoringType};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::require_capability;

#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// POST /challenges: start a challenge now.
pub async fn create_challenge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ManageChallenges)?;
    let scoring_type = req.scoring_type.parse::<ScoringType>().map_err(GameError::from)?;

    let new = NewChallenge {
        title: req.title,
        description: req.description,
        scoring_type,
        duration_minutes: req.duration_minutes,
        badge_name: req.badge_name,
        badge_emoji: req.badge_emoji,
    };
    let challenge = blocking(&state, move |db| db.create_challenge(new, chrono::Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

/// GET /challenges/active: running challenges; expired ones are resolved first.
pub async fn list_active(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let challenges = blocking(&state, |db| db.list_active_challenges(chrono::Utc::now())).await?;
    Ok(Json(challenges))
}

/// GET /challenges: full history for the dashboard.
pub async fn list_challenges(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ChallengeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ManageChallenges)?;
    let challenges = blocking(&state, move |db| {
        db.list_challenges(query.limit.min(200), chrono::Utc::now())
    })
    .await?;
    Ok(Json(challenges))
}

pub async fn get_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let challenge = blocking(&state, move |db| db.get_challenge(challenge_id, chrono::Utc::now())).await?;
    Ok(Json(challenge))
}

/// POST /challenges/{challenge_id}/end: end early and award the badge.
pub async fn end_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_capability(&claims, Capability::ManageChallenges)?;
    let outcome = blocking(&state, move |db| db.end_challenge_now(challenge_id, chrono::Utc::now())).await?;
    Ok(Json(EndChallengeResponse {
        winner: outcome.winner,
        results: outcome.results,
    }))
}
