use std::time::Instant;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    dto::format_system_time,
    queue::{QueueEntry, TrackDescriptor},
    state::{
        game::{AcceptedAnswer, GameSession, GuessOutcome},
        modes::{GameMode, GuessSurface},
        scoreboard::ScoreEntry,
        state_machine::{RoundPhase, SessionPhase},
    },
};

/// Payload starting a game in a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartGameRequest {
    /// Participant starting the game.
    #[validate(length(min = 1))]
    pub host: String,
    /// Game flavour.
    #[serde(default)]
    pub mode: GameMode,
    /// Accepted-answer policy (competitive games always require both).
    #[serde(default)]
    pub accepted_answer: AcceptedAnswer,
    /// Score ending the game when reached.
    pub goal: Option<u32>,
    /// Number of tracks after which the game ends.
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
    /// Display name of the playlist.
    #[validate(length(min = 1, max = 100))]
    pub playlist_name: String,
    /// Shuffle the playlist before playing it.
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    /// Members present in the listening context when the game starts.
    #[serde(default)]
    pub participants: Vec<String>,
    /// Ordered playlist entries.
    #[validate(length(min = 1), custom(function = "validate_tracks"))]
    pub tracks: Vec<TrackEntryInput>,
}

fn default_shuffle() -> bool {
    true
}

/// Playlist entry as produced by the playlist resolver.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackEntryInput {
    /// Track the audio player can decode directly.
    Encoded {
        /// Encoded track identifier.
        encoded: String,
    },
    /// Track that has to be searched for.
    Descriptor {
        /// Track title.
        title: String,
        /// Credited artists, primary first.
        #[serde(default)]
        artists: Vec<String>,
        /// Accent color.
        color: Option<String>,
        /// Cover art URL.
        image: Option<String>,
    },
}

impl From<TrackEntryInput> for QueueEntry {
    fn from(value: TrackEntryInput) -> Self {
        match value {
            TrackEntryInput::Encoded { encoded } => QueueEntry::Encoded(encoded),
            TrackEntryInput::Descriptor {
                title,
                artists,
                color,
                image,
            } => QueueEntry::Descriptor(TrackDescriptor {
                title,
                artists,
                color,
                image,
            }),
        }
    }
}

fn validate_tracks(tracks: &[TrackEntryInput]) -> Result<(), ValidationError> {
    let blank = tracks.iter().any(|track| match track {
        TrackEntryInput::Encoded { encoded } => encoded.trim().is_empty(),
        TrackEntryInput::Descriptor { title, .. } => title.trim().is_empty(),
    });

    if blank {
        let mut err = ValidationError::new("track_blank");
        err.message = Some("Every track needs an encoded identifier or a title".into());
        return Err(err);
    }
    Ok(())
}

/// A free-text guess.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    /// Guesser.
    #[validate(length(min = 1))]
    pub participant: String,
    /// Raw guess text.
    #[validate(length(max = 500))]
    pub text: String,
    /// Where the guess was typed.
    #[serde(default = "default_surface")]
    pub surface: GuessSurface,
}

fn default_surface() -> GuessSurface {
    GuessSurface::Shared
}

/// Result of a guess.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessResponse {
    /// What the guess achieved.
    pub outcome: GuessOutcome,
}

/// A participant acting on the session (pass, join).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ParticipantRequest {
    /// Participant.
    #[validate(length(min = 1))]
    pub participant: String,
}

/// Result of a pass.
#[derive(Debug, Serialize, ToSchema)]
pub struct PassResponse {
    /// Participants who passed so far.
    pub passed: usize,
    /// Participants in the session.
    pub total: usize,
}

/// Result of a join.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// False when the participant was already present.
    pub joined: bool,
}

/// Audio player reports the current track ended.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TrackEndRequest {
    /// Player supplied reason (`finished`, `stopped`, `replaced`, ...).
    pub reason: Option<String>,
}

/// Audio player reports an exception while playing.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TrackExceptionRequest {
    /// Error description.
    #[validate(length(max = 1000))]
    pub message: String,
}

/// Audio player reports stalled playback.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackStuckRequest {
    /// How long the player waits before giving up.
    pub threshold_ms: u64,
}

/// Kinds of hosting context loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContextLossKind {
    /// The text channel of the game was deleted.
    TextChannelDeleted,
    /// The voice channel of the game was deleted.
    VoiceChannelDeleted,
    /// The whole guild became unreachable.
    GuildUnavailable,
}

/// The hosting context of a game disappeared.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ContextLostRequest {
    /// What was lost.
    pub kind: ContextLossKind,
}

/// Participant as exposed by snapshots.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantView {
    /// Identifier.
    pub id: String,
    /// Currently listening.
    pub present: bool,
    /// Rounds listened to.
    pub rounds_listened: u32,
    /// Listening time so far.
    pub listen_time_ms: u64,
    /// Game score.
    pub score: f64,
    /// Ongoing streak.
    pub streak: u32,
}

/// Read-only summary of a running game.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSnapshot {
    /// Session run identifier.
    pub id: Uuid,
    /// Hosting room.
    pub room: String,
    /// Participant who started the game.
    pub host: String,
    /// Game flavour.
    pub mode: GameMode,
    /// Accepted-answer policy.
    pub accepted_answer: AcceptedAnswer,
    /// Lifecycle phase (`created`, `joining`, `loading`, `open`, `ended`).
    pub phase: String,
    /// Score ending the game.
    pub goal: Option<u32>,
    /// Number of tracks after which the game ends.
    pub limit: Option<u32>,
    /// Playlist being played.
    pub playlist_name: String,
    /// Participants in enrollment order.
    pub participants: Vec<ParticipantView>,
    /// Top of the scoreboard.
    pub leaderboard: Vec<ScoreEntry>,
    /// Tracks played so far.
    pub tracks_played: usize,
    /// Tracks that can still be played in total.
    pub playlist_length: usize,
    /// Entries not played yet.
    pub remaining: usize,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// Lowercase name of a lifecycle phase.
pub fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Created => "created",
        SessionPhase::Active(RoundPhase::Joining) => "joining",
        SessionPhase::Active(RoundPhase::Loading) => "loading",
        SessionPhase::Active(RoundPhase::Open) => "open",
        SessionPhase::Ended(_) => "ended",
    }
}

impl From<&GameSession> for GameSnapshot {
    fn from(session: &GameSession) -> Self {
        let now = Instant::now();
        let participants = session
            .participants
            .values()
            .map(|participant| ParticipantView {
                id: participant.id.clone(),
                present: participant.is_present(),
                rounds_listened: participant.rounds_listened,
                listen_time_ms: participant.listen_time(now).as_millis() as u64,
                score: session.scoreboard.get(&participant.id),
                streak: session.streaks.get(&participant.id),
            })
            .collect();

        Self {
            id: session.id,
            room: session.room.clone(),
            host: session.settings.host.clone(),
            mode: session.settings.mode,
            accepted_answer: session.settings.accepted_answer,
            phase: phase_label(session.lifecycle.phase()).to_owned(),
            goal: session.settings.goal,
            limit: session.settings.limit,
            playlist_name: session.settings.playlist_name.clone(),
            participants,
            leaderboard: session.leaderboard(),
            tracks_played: session.queue.tracks_played(),
            playlist_length: session.queue.playlist_length(),
            remaining: session.queue.remaining(),
            created_at: format_system_time(session.created_at),
        }
    }
}
