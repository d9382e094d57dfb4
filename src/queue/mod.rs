//! Playlist consumption: resolving entries, starting playback and bookkeeping of played tracks.

mod cache;

use std::{collections::VecDeque, future::Future, sync::Arc, time::Duration};

use rand::{Rng, seq::SliceRandom};
use tokio::time::timeout;
use tracing::{debug, warn};

pub use self::cache::ResolutionCache;
use crate::{
    audio::{AudioError, AudioPlayer, AudioResult, LoadResult, PlayableTrack, PlaybackWindow},
    matching::FuzzyMatcher,
    state::round::RoundData,
};

/// Playlist entry as provided by the playlist resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    /// Identifier the player can decode directly.
    Encoded(String),
    /// Track that still has to be searched for.
    Descriptor(TrackDescriptor),
}

/// Unresolved track metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescriptor {
    /// Track title.
    pub title: String,
    /// Credited artists, primary first.
    pub artists: Vec<String>,
    /// Accent color for renderers.
    pub color: Option<String>,
    /// Cover art URL.
    pub image: Option<String>,
}

impl TrackDescriptor {
    /// `title - primary artist`, used both as search query and cache key.
    pub fn display(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} - {}", self.title, artist),
            None => self.title.clone(),
        }
    }
}

/// Tunables copied from the application configuration.
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// Length of each played excerpt.
    pub window: Duration,
    /// Upper bound for any player call.
    pub timeout: Duration,
    /// Matcher handed to every new round.
    pub matcher: FuzzyMatcher,
}

/// Result of [`TrackQueue::next`].
#[derive(Debug)]
pub enum Advance {
    /// A track is playing and its round is ready.
    Started {
        /// Track now playing.
        track: PlayableTrack,
        /// Excerpt being played.
        window: PlaybackWindow,
        /// Fresh round for the track.
        round: RoundData,
    },
    /// The popped entry could not be played; the playlist length was already adjusted.
    Failed {
        /// Human readable name of the entry.
        display: String,
        /// What went wrong.
        reason: String,
    },
    /// Nothing left to play.
    Exhausted,
}

/// Ordered entries of one session plus the player handle used to play them.
pub struct TrackQueue {
    room: String,
    entries: VecDeque<QueueEntry>,
    playlist_length: usize,
    now_playing: Option<PlayableTrack>,
    player: Arc<dyn AudioPlayer>,
    cache: Arc<ResolutionCache>,
    options: QueueOptions,
    ended: bool,
}

impl TrackQueue {
    /// Queue playing `entries` in the given order.
    pub fn new(
        room: impl Into<String>,
        entries: Vec<QueueEntry>,
        player: Arc<dyn AudioPlayer>,
        cache: Arc<ResolutionCache>,
        options: QueueOptions,
    ) -> Self {
        Self {
            room: room.into(),
            playlist_length: entries.len(),
            entries: entries.into(),
            now_playing: None,
            player,
            cache,
            options,
            ended: false,
        }
    }

    /// Shuffle the remaining entries.
    pub fn shuffled(mut self) -> Self {
        self.entries.make_contiguous().shuffle(&mut rand::rng());
        self
    }

    /// Entries that could still be played, failed ones excluded.
    pub fn playlist_length(&self) -> usize {
        self.playlist_length
    }

    /// Entries not popped yet.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Tracks that actually played.
    pub fn tracks_played(&self) -> usize {
        self.playlist_length.saturating_sub(self.entries.len())
    }

    /// Track currently playing.
    pub fn now_playing(&self) -> Option<&PlayableTrack> {
        self.now_playing.as_ref()
    }

    /// Pop and start the next entry.
    pub async fn next(&mut self) -> Advance {
        if self.ended {
            return Advance::Exhausted;
        }
        let Some(entry) = self.entries.pop_front() else {
            return Advance::Exhausted;
        };

        let (display, resolved) = match entry {
            QueueEntry::Encoded(encoded) => {
                let display = encoded.clone();
                (display, self.decode(encoded).await)
            }
            QueueEntry::Descriptor(descriptor) => {
                (descriptor.display(), self.resolve(descriptor).await)
            }
        };

        let track = match resolved {
            Ok(track) => track,
            Err(reason) => return self.fail(display, reason),
        };

        let window = random_window(track.info.length_ms, self.options.window);
        let round = RoundData::new(
            &track.info.title,
            &track.info.credited_artists(),
            self.options.matcher,
        );

        let play = self.player.play(&self.room, &track, window);
        if let Err(err) = self.bounded(play).await {
            return self.fail(display, err.to_string());
        }

        debug!(
            room = %self.room,
            title = %track.info.title,
            start_ms = window.start_ms,
            "track started"
        );
        self.now_playing = Some(track.clone());
        Advance::Started {
            track,
            window,
            round,
        }
    }

    /// Playback of the current track broke; it no longer counts as played.
    pub fn discount_current(&mut self) {
        if self.now_playing.take().is_some() {
            self.playlist_length = self.playlist_length.saturating_sub(1);
        }
    }

    /// Stop the current track, keeping the listening context.
    pub async fn stop_playback(&self) -> AudioResult<()> {
        let stop = self.player.stop(&self.room);
        self.bounded(stop).await
    }

    /// Stop playback and release the listening context. Safe to call more than once.
    pub async fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.now_playing = None;

        let stop = self.player.stop(&self.room);
        if let Err(err) = self.bounded(stop).await {
            warn!(room = %self.room, error = %err, "failed to stop playback");
        }
        let leave = self.player.leave(&self.room);
        if let Err(err) = self.bounded(leave).await {
            warn!(room = %self.room, error = %err, "failed to leave listening context");
        }
    }

    fn fail(&mut self, entry: String, reason: String) -> Advance {
        self.playlist_length = self.playlist_length.saturating_sub(1);
        self.now_playing = None;
        warn!(room = %self.room, %entry, %reason, "skipping unplayable entry");
        Advance::Failed {
            display: entry,
            reason,
        }
    }

    async fn decode(&self, encoded: String) -> Result<PlayableTrack, String> {
        let decode = self.player.decode(&encoded);
        let info = self.bounded(decode).await.map_err(|err| err.to_string())?;
        Ok(PlayableTrack { encoded, info })
    }

    async fn resolve(&self, descriptor: TrackDescriptor) -> Result<PlayableTrack, String> {
        let display = descriptor.display();

        let mut track = match self.cache.get(&display) {
            Some(track) => track,
            None => {
                let load = self.player.load(&format!("ytsearch:{display}"));
                match self.bounded(load).await.map_err(|err| err.to_string())? {
                    LoadResult::Search(tracks) => tracks
                        .into_iter()
                        .next()
                        .ok_or_else(|| format!("no results for `{display}`"))?,
                    LoadResult::Empty => return Err(format!("no results for `{display}`")),
                    LoadResult::Failed(message) => return Err(message),
                }
            }
        };

        // Keep the playlist's own metadata instead of the search hit's upload title.
        track.info.title = descriptor.title;
        if !descriptor.artists.is_empty() {
            track.info.artists = descriptor.artists;
        }
        track.info.color = descriptor.color.or(track.info.color);
        track.info.image = descriptor.image.or(track.info.image);

        self.cache.insert(&display, track.clone());
        Ok(track)
    }

    async fn bounded<T>(&self, call: impl Future<Output = AudioResult<T>>) -> AudioResult<T> {
        match timeout(self.options.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AudioError::Timeout),
        }
    }
}

/// Random excerpt `[r, r + window]` with `r` uniform in `[0, length - window)`.
pub fn random_window(length_ms: u64, window: Duration) -> PlaybackWindow {
    let span = window.as_millis() as u64;
    let start_ms = if length_ms > span {
        rand::rng().random_range(0..length_ms - span)
    } else {
        0
    };
    PlaybackWindow {
        start_ms,
        end_ms: start_ms + span,
    }
}
