use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report running games and cache size while logging storage connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.member_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "member store health check failed");
            }
        }
        None => warn!("member store unavailable (degraded mode)"),
    }

    let active_games = state.registry().len();
    let cached_tracks = state.cache().len();
    if state.is_degraded().await {
        HealthResponse::degraded(active_games, cached_tracks)
    } else {
        HealthResponse::ok(active_games, cached_tracks)
    }
}
