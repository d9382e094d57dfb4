//! Scriptable in-memory player used by unit tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;

use super::{AudioError, AudioPlayer, AudioResult, LoadResult, PlayableTrack, PlaybackWindow, TrackInfo};

/// Calls observed by [`FakePlayer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    /// A track was started in a room.
    Play {
        /// Room the track plays in.
        room: String,
        /// Encoded track identifier.
        encoded: String,
        /// Slice of the track that plays.
        window: PlaybackWindow,
    },
    /// Playback was stopped in a room.
    Stop(String),
    /// The player left a room.
    Leave(String),
}

/// Player answering from scripted tables and recording what it was asked to do.
#[derive(Default)]
pub struct FakePlayer {
    decoded: Mutex<HashMap<String, TrackInfo>>,
    searches: Mutex<HashMap<String, LoadResult>>,
    calls: Mutex<Vec<PlayerCall>>,
    loads: AtomicUsize,
    failing_plays: Mutex<Vec<String>>,
    decode_delays: Mutex<HashMap<String, Duration>>,
}

impl FakePlayer {
    /// Player that knows no tracks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata returned for an encoded track.
    pub fn with_track(self, encoded: &str, title: &str, artists: &[&str], length_ms: u64) -> Self {
        self.decoded
            .lock()
            .unwrap()
            .insert(encoded.to_string(), track_info(title, artists, length_ms));
        self
    }

    /// Register the result of a search query.
    pub fn with_search(self, query: &str, result: LoadResult) -> Self {
        self.searches
            .lock()
            .unwrap()
            .insert(query.to_string(), result);
        self
    }

    /// Make `play` fail for this encoded track.
    pub fn failing_play(self, encoded: &str) -> Self {
        self.failing_plays.lock().unwrap().push(encoded.to_string());
        self
    }

    /// Make `decode` of this encoded track take `delay`.
    pub fn slow_decode(self, encoded: &str, delay: Duration) -> Self {
        self.decode_delays
            .lock()
            .unwrap()
            .insert(encoded.to_string(), delay);
        self
    }

    /// Number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Everything recorded so far.
    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Encoded ids passed to `play`, in order.
    pub fn played(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlayerCall::Play { encoded, .. } => Some(encoded),
                _ => None,
            })
            .collect()
    }

    /// Number of `stop` calls.
    pub fn stops(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, PlayerCall::Stop(_)))
            .count()
    }
}

/// Metadata helper for tests.
pub fn track_info(title: &str, artists: &[&str], length_ms: u64) -> TrackInfo {
    TrackInfo {
        title: title.to_string(),
        author: artists.first().copied().unwrap_or_default().to_string(),
        artists: artists.iter().map(|a| a.to_string()).collect(),
        length_ms,
        uri: None,
        color: None,
        image: None,
    }
}

/// Search result with a single track.
pub fn search_hit(encoded: &str, title: &str, artists: &[&str]) -> LoadResult {
    LoadResult::Search(vec![PlayableTrack {
        encoded: encoded.to_string(),
        info: track_info(title, artists, 200_000),
    }])
}

impl AudioPlayer for FakePlayer {
    fn play(
        &self,
        room: &str,
        track: &PlayableTrack,
        window: PlaybackWindow,
    ) -> BoxFuture<'static, AudioResult<()>> {
        let failing = self.failing_plays.lock().unwrap().contains(&track.encoded);
        self.calls.lock().unwrap().push(PlayerCall::Play {
            room: room.to_string(),
            encoded: track.encoded.clone(),
            window,
        });
        Box::pin(async move {
            if failing {
                Err(AudioError::Rejected("scripted play failure".into()))
            } else {
                Ok(())
            }
        })
    }

    fn stop(&self, room: &str) -> BoxFuture<'static, AudioResult<()>> {
        self.calls
            .lock()
            .unwrap()
            .push(PlayerCall::Stop(room.to_string()));
        Box::pin(async { Ok(()) })
    }

    fn leave(&self, room: &str) -> BoxFuture<'static, AudioResult<()>> {
        self.calls
            .lock()
            .unwrap()
            .push(PlayerCall::Leave(room.to_string()));
        Box::pin(async { Ok(()) })
    }

    fn decode(&self, encoded: &str) -> BoxFuture<'static, AudioResult<TrackInfo>> {
        let decoded = self.decoded.lock().unwrap().get(encoded).cloned();
        let delay = self.decode_delays.lock().unwrap().get(encoded).copied();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            decoded.ok_or_else(|| AudioError::Rejected("unknown track".into()))
        })
    }

    fn load(&self, query: &str) -> BoxFuture<'static, AudioResult<LoadResult>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let result = self
            .searches
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or(LoadResult::Empty);
        Box::pin(async move { Ok(result) })
    }
}
