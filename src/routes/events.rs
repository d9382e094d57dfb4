use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::game::{ContextLostRequest, TrackEndRequest, TrackExceptionRequest, TrackStuckRequest},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Callbacks from the audio player and the chat layer about a room's playback context.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room}/events/track-end", post(track_end))
        .route("/rooms/{room}/events/track-exception", post(track_exception))
        .route("/rooms/{room}/events/track-stuck", post(track_stuck))
        .route("/rooms/{room}/events/context-lost", post(context_lost))
}

/// The current track finished or was stopped.
#[utoipa::path(
    post,
    path = "/rooms/{room}/events/track-end",
    tag = "events",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = TrackEndRequest,
    responses((status = 204, description = "Event handled"))
)]
pub async fn track_end(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<TrackEndRequest>,
) -> Result<StatusCode, AppError> {
    game_service::track_ended(&state, &room, payload.reason.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Playback of the current track failed.
#[utoipa::path(
    post,
    path = "/rooms/{room}/events/track-exception",
    tag = "events",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = TrackExceptionRequest,
    responses((status = 204, description = "Event handled"))
)]
pub async fn track_exception(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Valid(Json(payload)): Valid<Json<TrackExceptionRequest>>,
) -> Result<StatusCode, AppError> {
    game_service::track_failed(&state, &room, &payload.message).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Playback is stuck.
#[utoipa::path(
    post,
    path = "/rooms/{room}/events/track-stuck",
    tag = "events",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = TrackStuckRequest,
    responses((status = 204, description = "Event handled"))
)]
pub async fn track_stuck(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<TrackStuckRequest>,
) -> StatusCode {
    game_service::track_stalled(&state, &room, Duration::from_millis(payload.threshold_ms));
    StatusCode::NO_CONTENT
}

/// The text channel, voice channel or whole guild hosting the game went away.
#[utoipa::path(
    post,
    path = "/rooms/{room}/events/context-lost",
    tag = "events",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = ContextLostRequest,
    responses(
        (status = 204, description = "Game ended"),
        (status = 404, description = "No game in the room")
    )
)]
pub async fn context_lost(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<ContextLostRequest>,
) -> Result<StatusCode, AppError> {
    game_service::context_lost(&state, &room, payload.kind).await?;
    Ok(StatusCode::NO_CONTENT)
}
