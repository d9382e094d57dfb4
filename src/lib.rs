//! Library crate for neon-beat-trivia, exposing modules for binaries and integration tests.

/// Audio player client and playback types.
pub mod audio;
/// Runtime configuration loaded at startup.
pub mod config;
/// Member statistics persistence.
pub mod dao;
/// Request, response and event payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Answer normalisation and fuzzy matching.
pub mod matching;
/// Per-game playlist queue and track resolution.
pub mod queue;
/// HTTP routes.
pub mod routes;
/// Business operations over the shared state.
pub mod services;
/// Shared application state and game sessions.
pub mod state;
