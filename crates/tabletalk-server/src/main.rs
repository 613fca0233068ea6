mod sweep;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tabletalk_api::auth::{AppState, AppStateInner};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

fn required_env(name: &str) -> String {
    let value = std::env::var(name).unwrap_or_default();
    if value.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
        eprintln!("FATAL: {} is unset or still a placeholder.", name);
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }
    value
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabletalk=debug,tabletalk_api=debug,tabletalk_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = required_env("TABLETALK_JWT_SECRET");
    let admin_code = required_env("TABLETALK_ADMIN_CODE");
    let staff_code = required_env("TABLETALK_STAFF_CODE");
    if admin_code.eq_ignore_ascii_case(&staff_code) {
        anyhow::bail!("TABLETALK_ADMIN_CODE and TABLETALK_STAFF_CODE must differ");
    }

    let db_path: PathBuf = std::env::var("TABLETALK_DB_PATH")
        .unwrap_or_else(|_| "tabletalk.db".into())
        .into();
    let host = std::env::var("TABLETALK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TABLETALK_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let sweep_secs: u64 = std::env::var("TABLETALK_SWEEP_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);

    // Init database
    let db = tabletalk_db::Database::open(&db_path)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        admin_code,
        staff_code,
    });

    if sweep_secs > 0 {
        tokio::spawn(sweep::run_sweep_loop(state.clone(), sweep_secs));
        info!("Background sweep every {}s", sweep_secs);
    }

    let app = tabletalk_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("TableTalk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
