use std::time::Duration;

use tracing::{info, warn};

use tabletalk_api::auth::AppState;

/// Background task that resolves expired challenges and reaps idle users.
///
/// Read paths already do both lazily; this bounds how stale the stored state can
/// get when nobody is polling.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let st = state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let now = chrono::Utc::now();
            let resolved = st.db.sweep_expired(now)?;
            let reaped = st.db.reap_inactive(now)?;
            Ok::<_, tabletalk_db::GameError>((resolved.len(), reaped))
        })
        .await;

        match result {
            Ok(Ok((resolved, reaped))) => {
                if resolved > 0 || reaped > 0 {
                    info!("Sweep: resolved {} challenges, reaped {} users", resolved, reaped);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep task failed: {}", e),
        }
    }
}
