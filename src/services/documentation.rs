use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Neon Beat Trivia.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::room_stream,
        crate::routes::game::start_game,
        crate::routes::game::get_game,
        crate::routes::game::stop_game,
        crate::routes::game::submit_guess,
        crate::routes::game::pass_round,
        crate::routes::game::join_game,
        crate::routes::game::leave_game,
        crate::routes::events::track_end,
        crate::routes::events::track_exception,
        crate::routes::events::track_stuck,
        crate::routes::events::context_lost,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::StartGameRequest,
            crate::dto::game::TrackEntryInput,
            crate::dto::game::GameSnapshot,
            crate::dto::game::ParticipantView,
            crate::dto::game::GuessRequest,
            crate::dto::game::GuessResponse,
            crate::dto::game::ParticipantRequest,
            crate::dto::game::PassResponse,
            crate::dto::game::JoinResponse,
            crate::dto::game::TrackEndRequest,
            crate::dto::game::TrackExceptionRequest,
            crate::dto::game::TrackStuckRequest,
            crate::dto::game::ContextLostRequest,
            crate::dto::game::ContextLossKind,
            crate::dto::sse::Handshake,
            crate::dto::sse::RoundOpenedEvent,
            crate::dto::sse::RoundStartedEvent,
            crate::dto::sse::GuessAcceptedEvent,
            crate::dto::sse::GuessCompletedEvent,
            crate::dto::sse::ParticipantPassedEvent,
            crate::dto::sse::StreakLeader,
            crate::dto::sse::RoundSettledEvent,
            crate::dto::sse::SessionEndedEvent,
            crate::dto::sse::MemberProgress,
            crate::dto::sse::SessionAwardsEvent,
            crate::dto::sse::PlaybackFailedEvent,
            crate::dto::sse::PlaybackStalledEvent,
            crate::dto::sse::PlaybackRecoveredEvent,
            crate::dao::models::MemberRank,
            crate::state::game::AcceptedAnswer,
            crate::state::game::GuessKind,
            crate::state::game::GuessOutcome,
            crate::state::modes::GameMode,
            crate::state::modes::GuessSurface,
            crate::state::scoreboard::ScoreEntry,
            crate::state::state_machine::EndReason,
            crate::audio::PlaybackWindow,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "game", description = "Game lifecycle, guesses and presence"),
        (name = "events", description = "Playback and hosting context callbacks"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_room_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/rooms/{room}/game"));
        assert!(paths.contains_key("/rooms/{room}/events/track-end"));
        assert!(paths.contains_key("/sse/rooms/{room}"));
    }
}
