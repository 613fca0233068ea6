pub mod auth;
pub mod challenges;
pub mod error;
pub mod game;
pub mod leaderboard;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod reactions;
pub mod tables;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tracing::error;

use tabletalk_db::{Database, GameError};

use crate::auth::AppState;
use crate::error::ApiError;

/// Run a database call off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> tabletalk_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Game(GameError::Internal("worker panicked".into()))
        })?
        .map_err(ApiError::from)
}

async fn health() -> &'static str {
    "ok"
}

/// All routes. The server binary adds CORS and tracing layers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/join", post(auth::join_table))
        .route("/auth/dashboard", post(auth::dashboard_login))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/leaderboard", get(leaderboard::get_leaderboard))
        .route("/leaderboard/tv", get(leaderboard::get_tv_leaderboard))
        .route("/messages", post(messages::send_message))
        .route("/messages/inbox", get(messages::get_inbox))
        .route("/messages/audit", get(messages::get_audit))
        .route("/messages/{message_id}/reactions", post(reactions::toggle_reaction))
        .route("/broadcasts", post(messages::send_broadcast))
        .route("/challenges", get(challenges::list_challenges).post(challenges::create_challenge))
        .route("/challenges/active", get(challenges::list_active))
        .route("/challenges/{challenge_id}", get(challenges::get_challenge))
        .route("/challenges/{challenge_id}/end", post(challenges::end_challenge))
        .route("/game", get(game::get_game))
        .route("/game/reset", post(game::reset_game))
        .route("/game/{action}", post(game::game_action))
        .route("/tables", get(tables::list_tables).post(tables::create_table))
        .route("/tables/{table_id}", delete(tables::delete_table))
        .route("/tables/{table_id}/badges", get(tables::get_badges))
        .route("/tables/{table_id}/presence", get(presence::list_presence))
        .route("/presence/heartbeat", post(presence::heartbeat))
        .route("/presence/leave", post(presence::leave))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
