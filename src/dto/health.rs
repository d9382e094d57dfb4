use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Games currently running.
    pub active_games: usize,
    /// Resolved tracks kept in the shared cache.
    pub cached_tracks: usize,
}

impl HealthResponse {
    /// Everything operational.
    pub fn ok(active_games: usize, cached_tracks: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_games,
            cached_tracks,
        }
    }

    /// Games run but statistics are not persisted.
    pub fn degraded(active_games: usize, cached_tracks: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_games,
            cached_tracks,
        }
    }
}
