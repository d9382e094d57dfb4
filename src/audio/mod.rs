//! Audio player collaborator: resolving, decoding and playing tracks for a room.

/// Scripted player for tests.
#[cfg(test)]
pub mod fake;
/// Lavalink REST client.
pub mod lavalink;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Convenient result alias for audio player calls.
pub type AudioResult<T> = Result<T, AudioError>;

/// Failures reported by the audio player.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The call did not complete within the configured bound.
    #[error("audio player did not answer in time")]
    Timeout,
    /// The request could not be sent.
    #[error("failed to send `{operation}` request to the audio player")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The player answered with an unexpected status code.
    #[error("audio player answered `{operation}` with status {status}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
    },
    /// The response body could not be decoded.
    #[error("failed to decode audio player response for `{operation}`")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The player refused the request (unknown track, broken source...).
    #[error("audio player rejected the request: {0}")]
    Rejected(String),
}

/// Metadata about a playable track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackInfo {
    /// Display title.
    pub title: String,
    /// Uploader or author as reported by the source.
    pub author: String,
    /// Credited artists, primary first.
    pub artists: Vec<String>,
    /// Duration in milliseconds.
    pub length_ms: u64,
    /// Source URL, when known.
    pub uri: Option<String>,
    /// Accent color for renderers.
    pub color: Option<String>,
    /// Cover art URL.
    pub image: Option<String>,
}

impl TrackInfo {
    /// Artist list, falling back to the author when no artists are credited.
    pub fn credited_artists(&self) -> Vec<String> {
        if self.artists.is_empty() {
            vec![self.author.clone()]
        } else {
            self.artists.clone()
        }
    }
}

/// A track the player can start right away.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableTrack {
    /// Opaque identifier understood by the player.
    pub encoded: String,
    /// Decoded metadata.
    pub info: TrackInfo,
}

/// Outcome of a search request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    /// Matching tracks, best first.
    Search(Vec<PlayableTrack>),
    /// Nothing matched.
    Empty,
    /// The source failed to answer.
    Failed(String),
}

/// Excerpt of a track to play, in milliseconds from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlaybackWindow {
    /// Start offset.
    pub start_ms: u64,
    /// End offset.
    pub end_ms: u64,
}

/// Abstraction over the player serving a room's listening context.
pub trait AudioPlayer: Send + Sync {
    /// Start playing `track` in `room`, restricted to `window`.
    fn play(
        &self,
        room: &str,
        track: &PlayableTrack,
        window: PlaybackWindow,
    ) -> BoxFuture<'static, AudioResult<()>>;

    /// Stop whatever is playing in `room`.
    fn stop(&self, room: &str) -> BoxFuture<'static, AudioResult<()>>;

    /// Release the room's audio resources.
    fn leave(&self, room: &str) -> BoxFuture<'static, AudioResult<()>>;

    /// Decode metadata for an encoded track.
    fn decode(&self, encoded: &str) -> BoxFuture<'static, AudioResult<TrackInfo>>;

    /// Run a search query (e.g. `ytsearch:title - artist`).
    fn load(&self, query: &str) -> BoxFuture<'static, AudioResult<LoadResult>>;
}
