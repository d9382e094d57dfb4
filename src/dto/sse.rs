use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audio::PlaybackWindow,
    dao::models::MemberRank,
    state::{
        game::{AcceptedAnswer, GuessKind, GuessOutcome},
        modes::{GameMode, GuessSurface},
        scoreboard::ScoreEntry,
        state_machine::EndReason,
    },
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// Room the event belongs to; `None` for events every subscriber receives.
    pub room: Option<String>,
    /// Serialised payload.
    pub data: String,
}

impl ServerEvent {
    /// Event with a pre-rendered payload.
    pub fn new(event: impl Into<String>, room: Option<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            room,
            data: data.into(),
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<T>(event: &str, room: Option<String>, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self::new(event, room, serde_json::to_string(payload)?))
    }

    /// Whether a subscriber following `room` should receive the event.
    pub fn is_for(&self, room: &str) -> bool {
        self.room.as_deref().is_none_or(|target| target == room)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Room followed by the stream.
    pub room: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether statistics are currently not persisted.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent when a game starts in a room.
pub struct RoundOpenedEvent {
    /// Session run identifier.
    pub session_id: Uuid,
    /// Participant who started the game.
    pub host: String,
    /// Playlist being played.
    pub playlist_name: String,
    /// Game flavour.
    pub mode: GameMode,
    /// Where guesses are expected.
    pub guess_surface: GuessSurface,
    /// Accepted-answer policy.
    pub accepted_answer: AcceptedAnswer,
    /// Sentence describing what to guess.
    pub instructions: String,
    /// Score ending the game.
    pub goal: Option<u32>,
    /// Number of tracks after which the game ends.
    pub limit: Option<u32>,
    /// Opt-in period before the first track, in milliseconds.
    pub join_window_ms: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent when a track starts playing.
pub struct RoundStartedEvent {
    /// 1-based number of the round.
    pub round: usize,
    /// Tracks that can still be played in total.
    pub playlist_length: usize,
    /// Excerpt being played.
    pub window: PlaybackWindow,
    /// Accent color of the track.
    pub color: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Acknowledgment of a correct guess.
pub struct GuessAcceptedEvent {
    /// Guesser.
    pub participant: String,
    /// What the guess achieved.
    pub outcome: GuessOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
/// A competitive participant found both the title and the primary artist.
pub struct GuessCompletedEvent {
    /// Participant.
    pub participant: String,
    /// 1-based finishing position.
    pub position: usize,
    /// Time since the round opened.
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// A participant gave up on the round.
pub struct ParticipantPassedEvent {
    /// Participant.
    pub participant: String,
    /// Participants who passed so far.
    pub passed: usize,
    /// Participants in the session.
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Participant with the longest ongoing streak.
pub struct StreakLeader {
    /// Participant.
    pub participant: String,
    /// Consecutive solved rounds.
    pub streak: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Summary of a finished round.
pub struct RoundSettledEvent {
    /// Title of the track.
    pub title: String,
    /// Credited artists, primary first.
    pub artists: Vec<String>,
    /// Cover art URL.
    pub image: Option<String>,
    /// Whether the round counts as solved.
    pub solved: bool,
    /// Who solved it.
    pub solvers: Vec<String>,
    /// Half found in an unsolved both-answers round.
    pub partial: Option<GuessKind>,
    /// Every participant passed.
    pub everybody_passed: bool,
    /// Streak leader, when among the solvers.
    pub streak_leader: Option<StreakLeader>,
    /// Top of the scoreboard.
    pub leaderboard: Vec<ScoreEntry>,
    /// Tracks played so far.
    pub tracks_played: usize,
    /// Tracks that can still be played in total.
    pub playlist_length: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent once when a game ends.
pub struct SessionEndedEvent {
    /// Session run identifier.
    pub session_id: Uuid,
    /// Why it ended.
    pub reason: EndReason,
    /// Leader with a positive score.
    pub winner: Option<ScoreEntry>,
    /// Game duration.
    pub elapsed_ms: u64,
    /// Tracks played.
    pub tracks_played: usize,
    /// Final ranking.
    pub leaderboard: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Long-term progress of one participant after a game.
pub struct MemberProgress {
    /// Participant.
    pub participant: String,
    /// In-game score.
    pub score: f64,
    /// Points earned by this game.
    pub points_earned: i64,
    /// Total points.
    pub points: i64,
    /// Level after the game.
    pub level: u32,
    /// Level gained by this game.
    pub level_up: bool,
    /// Rank after the game.
    pub rank: MemberRank,
    /// Rank gained by this game.
    pub rank_up: bool,
    /// Whether they won the game.
    pub winner: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Awards of the participants who scored or ranked up.
pub struct SessionAwardsEvent {
    /// Session run identifier.
    pub session_id: Uuid,
    /// Per-participant progress.
    pub awards: Vec<MemberProgress>,
}

#[derive(Debug, Serialize, ToSchema)]
/// A track could not be resolved or played.
pub struct PlaybackFailedEvent {
    /// Human readable name of the track.
    pub track: String,
    /// What went wrong.
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Playback is stuck.
pub struct PlaybackStalledEvent {
    /// Estimated wait, rounded up to whole seconds.
    pub wait_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// A stalled notice expired.
pub struct PlaybackRecoveredEvent {
    /// Stall duration that was announced.
    pub waited_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_events_are_filtered() {
        let scoped = ServerEvent::new("round.opened", Some("a".into()), "{}");
        let global = ServerEvent::new("info", None, "{}");

        assert!(scoped.is_for("a"));
        assert!(!scoped.is_for("b"));
        assert!(global.is_for("b"));
    }

    #[test]
    fn json_payload_is_serialised() {
        let event = ServerEvent::json(
            "playback.stalled",
            Some("a".into()),
            &PlaybackStalledEvent { wait_secs: 3 },
        )
        .unwrap();
        assert_eq!(event.data, r#"{"wait_secs":3}"#);
    }
}
