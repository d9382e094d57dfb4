/// Long-term member statistics written when a game ends.
pub mod award_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game lifecycle, guesses and playback callbacks.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Member store connection supervision and degraded mode.
pub mod storage_supervisor;
