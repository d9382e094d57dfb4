use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use axum_valid::Valid;

use crate::{
    dto::game::{
        GameSnapshot, GuessRequest, GuessResponse, JoinResponse, ParticipantRequest, PassResponse,
        StartGameRequest,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes driving a game from the chat layer: start, guesses, passes and presence.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room}/game", post(start_game).get(get_game))
        .route("/rooms/{room}/game/stop", post(stop_game))
        .route("/rooms/{room}/guesses", post(submit_guess))
        .route("/rooms/{room}/passes", post(pass_round))
        .route("/rooms/{room}/participants", post(join_game))
        .route(
            "/rooms/{room}/participants/{participant}",
            delete(leave_game),
        )
}

/// Start a game in a room and play its first track.
#[utoipa::path(
    post,
    path = "/rooms/{room}/game",
    tag = "game",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = StartGameRequest,
    responses(
        (status = 201, description = "Game started", body = GameSnapshot),
        (status = 400, description = "Invalid game settings"),
        (status = 409, description = "A game is already running in the room")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Valid(Json(payload)): Valid<Json<StartGameRequest>>,
) -> Result<(StatusCode, Json<GameSnapshot>), AppError> {
    let snapshot = game_service::start_game(&state, &room, payload).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Describe the game running in a room.
#[utoipa::path(
    get,
    path = "/rooms/{room}/game",
    tag = "game",
    params(("room" = String, Path, description = "Room hosting the game")),
    responses(
        (status = 200, description = "Running game", body = GameSnapshot),
        (status = 404, description = "No game in the room")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(room): Path<String>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::snapshot(&state, &room).await?;
    Ok(Json(snapshot))
}

/// Stop the game running in a room.
#[utoipa::path(
    post,
    path = "/rooms/{room}/game/stop",
    tag = "game",
    params(("room" = String, Path, description = "Room hosting the game")),
    responses(
        (status = 204, description = "Game stopped"),
        (status = 404, description = "No game in the room")
    )
)]
pub async fn stop_game(
    State(state): State<SharedState>,
    Path(room): Path<String>,
) -> Result<StatusCode, AppError> {
    game_service::stop(&state, &room).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Submit a free-text guess.
#[utoipa::path(
    post,
    path = "/rooms/{room}/guesses",
    tag = "game",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess processed", body = GuessResponse),
        (status = 400, description = "Guess sent on the wrong surface"),
        (status = 404, description = "No game in the room")
    )
)]
pub async fn submit_guess(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Valid(Json(payload)): Valid<Json<GuessRequest>>,
) -> Result<Json<GuessResponse>, AppError> {
    let outcome = game_service::guess(&state, &room, payload).await?;
    Ok(Json(GuessResponse { outcome }))
}

/// Give up on the current round.
#[utoipa::path(
    post,
    path = "/rooms/{room}/passes",
    tag = "game",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = ParticipantRequest,
    responses(
        (status = 200, description = "Pass recorded", body = PassResponse),
        (status = 400, description = "Not a participant"),
        (status = 409, description = "Already passed or no round open")
    )
)]
pub async fn pass_round(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Valid(Json(payload)): Valid<Json<ParticipantRequest>>,
) -> Result<Json<PassResponse>, AppError> {
    let outcome = game_service::pass(&state, &room, &payload.participant).await?;
    Ok(Json(PassResponse {
        passed: outcome.passed,
        total: outcome.total,
    }))
}

/// A member entered the listening context, or opted into a competitive game.
#[utoipa::path(
    post,
    path = "/rooms/{room}/participants",
    tag = "game",
    params(("room" = String, Path, description = "Room hosting the game")),
    request_body = ParticipantRequest,
    responses(
        (status = 200, description = "Presence recorded", body = JoinResponse),
        (status = 404, description = "No game in the room")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Valid(Json(payload)): Valid<Json<ParticipantRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    let joined = game_service::join(&state, &room, &payload.participant).await?;
    Ok(Json(JoinResponse { joined }))
}

/// A member left the listening context.
#[utoipa::path(
    delete,
    path = "/rooms/{room}/participants/{participant}",
    tag = "game",
    params(
        ("room" = String, Path, description = "Room hosting the game"),
        ("participant" = String, Path, description = "Departing member")
    ),
    responses(
        (status = 204, description = "Departure recorded"),
        (status = 404, description = "No game in the room")
    )
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Path((room, participant)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    game_service::leave(&state, &room, &participant).await?;
    Ok(StatusCode::NO_CONTENT)
}
