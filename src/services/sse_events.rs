use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::{
    audio::{PlayableTrack, PlaybackWindow},
    dto::sse::{
        GuessAcceptedEvent, GuessCompletedEvent, MemberProgress, ParticipantPassedEvent,
        PlaybackFailedEvent, PlaybackRecoveredEvent, PlaybackStalledEvent, RoundOpenedEvent,
        RoundSettledEvent, RoundStartedEvent, ServerEvent, SessionAwardsEvent, SessionEndedEvent,
        StreakLeader,
    },
    state::{
        SharedState,
        game::{GameSession, GuessOutcome, PassOutcome, RoundSettlement},
        state_machine::EndReason,
    },
};

const EVENT_ROUND_OPENED: &str = "round.opened";
const EVENT_ROUND_STARTED: &str = "round.started";
const EVENT_GUESS_ACCEPTED: &str = "guess.accepted";
const EVENT_GUESS_COMPLETED: &str = "guess.completed";
const EVENT_PARTICIPANT_PASSED: &str = "participant.passed";
const EVENT_ROUND_SETTLED: &str = "round.settled";
const EVENT_SESSION_ENDED: &str = "session.ended";
const EVENT_SESSION_AWARDS: &str = "session.awards";
const EVENT_PLAYBACK_FAILED: &str = "playback.failed";
const EVENT_PLAYBACK_STALLED: &str = "playback.stalled";
const EVENT_PLAYBACK_RECOVERED: &str = "playback.recovered";

/// Announce a new game and what has to be guessed.
pub fn broadcast_round_opened(
    state: &SharedState,
    session: &GameSession,
    join_window: Option<Duration>,
) {
    let settings = &session.settings;
    let payload = RoundOpenedEvent {
        session_id: session.id,
        host: settings.host.clone(),
        playlist_name: settings.playlist_name.clone(),
        mode: settings.mode,
        guess_surface: settings.mode.guess_surface(),
        accepted_answer: settings.accepted_answer,
        instructions: settings.accepted_answer.describe().to_owned(),
        goal: settings.goal,
        limit: settings.limit,
        join_window_ms: join_window.map(|window| window.as_millis() as u64),
    };
    send_room_event(state, &session.room, EVENT_ROUND_OPENED, &payload);
}

/// Announce the track that just started.
pub fn broadcast_round_started(
    state: &SharedState,
    session: &GameSession,
    track: &PlayableTrack,
    window: PlaybackWindow,
) {
    let payload = RoundStartedEvent {
        round: session.queue.tracks_played(),
        playlist_length: session.queue.playlist_length(),
        window,
        color: track.info.color.clone(),
    };
    send_room_event(state, &session.room, EVENT_ROUND_STARTED, &payload);
}

/// Acknowledge a correct guess.
pub fn broadcast_guess_accepted(state: &SharedState, room: &str, participant: &str, outcome: &GuessOutcome) {
    let payload = GuessAcceptedEvent {
        participant: participant.to_owned(),
        outcome: outcome.clone(),
    };
    send_room_event(state, room, EVENT_GUESS_ACCEPTED, &payload);
}

/// A competitive participant found everything.
pub fn broadcast_guess_completed(
    state: &SharedState,
    room: &str,
    participant: &str,
    position: usize,
    elapsed_ms: u64,
) {
    let payload = GuessCompletedEvent {
        participant: participant.to_owned(),
        position,
        elapsed_ms,
    };
    send_room_event(state, room, EVENT_GUESS_COMPLETED, &payload);
}

/// A participant passed.
pub fn broadcast_participant_passed(state: &SharedState, room: &str, participant: &str, pass: PassOutcome) {
    let payload = ParticipantPassedEvent {
        participant: participant.to_owned(),
        passed: pass.passed,
        total: pass.total,
    };
    send_room_event(state, room, EVENT_PARTICIPANT_PASSED, &payload);
}

/// Summarise a finished round.
pub fn broadcast_round_settled(
    state: &SharedState,
    session: &GameSession,
    title: &str,
    settlement: RoundSettlement,
) {
    let (artists, image) = session
        .queue
        .now_playing()
        .map(|track| (track.info.credited_artists(), track.info.image.clone()))
        .unwrap_or_default();

    let payload = RoundSettledEvent {
        title: title.to_owned(),
        artists,
        image,
        solved: settlement.solved,
        solvers: settlement.solvers,
        partial: settlement.partial,
        everybody_passed: settlement.everybody_passed,
        streak_leader: settlement
            .streak_leader
            .map(|(participant, streak)| StreakLeader {
                participant,
                streak,
            }),
        leaderboard: session.leaderboard(),
        tracks_played: session.queue.tracks_played(),
        playlist_length: session.queue.playlist_length(),
    };
    send_room_event(state, &session.room, EVENT_ROUND_SETTLED, &payload);
}

/// Final summary of a game.
pub fn broadcast_session_ended(state: &SharedState, session: &GameSession, reason: EndReason) {
    let payload = SessionEndedEvent {
        session_id: session.id,
        reason,
        winner: session.winner(),
        elapsed_ms: session.started_at.elapsed().as_millis() as u64,
        tracks_played: session.queue.tracks_played(),
        leaderboard: session.leaderboard(),
    };
    send_room_event(state, &session.room, EVENT_SESSION_ENDED, &payload);
}

/// Long-term progress of the participants who scored or ranked up.
pub fn broadcast_session_awards(state: &SharedState, session: &GameSession, awards: Vec<MemberProgress>) {
    let awards: Vec<MemberProgress> = awards
        .into_iter()
        .filter(|award| award.score > 0.0 || award.rank_up)
        .collect();
    if awards.is_empty() {
        return;
    }

    let payload = SessionAwardsEvent {
        session_id: session.id,
        awards,
    };
    send_room_event(state, &session.room, EVENT_SESSION_AWARDS, &payload);
}

/// A track was skipped because it could not be resolved or played.
pub fn broadcast_playback_failed(state: &SharedState, room: &str, track: &str, reason: &str) {
    let payload = PlaybackFailedEvent {
        track: track.to_owned(),
        reason: reason.to_owned(),
    };
    send_room_event(state, room, EVENT_PLAYBACK_FAILED, &payload);
}

/// Playback is stuck; tell listeners how long to wait.
pub fn broadcast_playback_stalled(state: &SharedState, room: &str, wait_secs: u64) {
    send_room_event(
        state,
        room,
        EVENT_PLAYBACK_STALLED,
        &PlaybackStalledEvent { wait_secs },
    );
}

/// The stalled notice expired.
pub fn broadcast_playback_recovered(state: &SharedState, room: &str, waited_secs: u64) {
    send_room_event(
        state,
        room,
        EVENT_PLAYBACK_RECOVERED,
        &PlaybackRecoveredEvent { waited_secs },
    );
}

fn send_room_event(state: &SharedState, room: &str, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(event, Some(room.to_owned()), payload) {
        Ok(event) => {
            state.sse().publish(event);
        }
        Err(err) => warn!(room, event, error = %err, "failed to serialize SSE payload"),
    }
}
