use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChallengeResults, Role};

// -- JWT Claims --

/// JWT claims for both table attendees and dashboard users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Presence user id for tables, role name for dashboard users.
    pub sub: String,
    pub role: Role,
    pub table_id: Option<String>,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinTableRequest {
    pub table_id: String,
    pub join_code: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct JoinTableResponse {
    pub user_id: Uuid,
    pub table_id: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardLoginRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardLoginResponse {
    pub role: Role,
    pub token: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    pub to_table: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastRequest {
    pub content: String,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    /// Parsed into a `ReactionKind` by the handler so bad values surface as validation errors.
    pub kind: String,
}

// -- Tables --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTableRequest {
    pub id: String,
}

// -- Challenges --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChallengeRequest {
    pub title: String,
    pub description: Option<String>,
    pub scoring_type: String,
    pub duration_minutes: i64,
    pub badge_name: String,
    pub badge_emoji: String,
}

#[derive(Debug, Serialize)]
pub struct EndChallengeResponse {
    pub winner: Option<String>,
    pub results: ChallengeResults,
}
