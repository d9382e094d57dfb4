use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::time::sleep;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dto::game::{ContextLossKind, GameSnapshot, GuessRequest, StartGameRequest},
    error::ServiceError,
    queue::{Advance, QueueEntry, TrackQueue},
    services::{award_service, sse_events},
    state::{
        SessionHandle, SharedState,
        game::{Departure, GameSession, GameSettings, GuessOutcome, PassOutcome, PassRejection},
        modes::GameMode,
        state_machine::{EndReason, SessionEvent},
    },
};

/// Track end reasons that do not close the current round.
const IGNORED_END_REASONS: [&str; 2] = ["replaced", "loadfailed"];

/// Create a game in `room`, announce it and start the first track (or the join window).
pub async fn start_game(
    state: &SharedState,
    room: &str,
    request: StartGameRequest,
) -> Result<GameSnapshot, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let min_goal = state.config().min_goal();
    if let Some(goal) = request.goal {
        if goal < min_goal {
            return Err(ServiceError::InvalidInput(format!(
                "goal must be at least {min_goal}"
            )));
        }
    }
    if state.registry().get(room).is_some() {
        return Err(ServiceError::Conflict(format!(
            "a game is already running in room {room}"
        )));
    }

    let entries: Vec<QueueEntry> = request.tracks.into_iter().map(Into::into).collect();
    let mut queue = TrackQueue::new(
        room,
        entries,
        state.player(),
        state.cache().clone(),
        state.queue_options(),
    );
    if request.shuffle {
        queue = queue.shuffled();
    }

    let settings = GameSettings {
        host: request.host.clone(),
        mode: request.mode,
        accepted_answer: request.mode.accepted_answer(request.accepted_answer),
        goal: request.goal,
        limit: request.limit,
        playlist_name: request.playlist_name,
        placement_bonuses: state.config().placement_bonuses().to_vec(),
    };

    let mut present = request.participants;
    if !present.contains(&request.host) {
        present.insert(0, request.host);
    }

    let mut session = GameSession::new(room, settings, queue);
    session.seed_participants(&present, Instant::now());
    let join_window = request.mode.join_window(state.config().join_window());

    let handle = Arc::new(SessionHandle::new(session));
    state.registry().insert(handle.clone())?;

    detached(open_game(state.clone(), handle, join_window)).await?
}

async fn open_game(
    state: SharedState,
    handle: Arc<SessionHandle>,
    join_window: Option<Duration>,
) -> Result<GameSnapshot, ServiceError> {
    let mut session = handle.lock().await;
    info!(
        room = %session.room,
        session = %session.id,
        mode = ?session.mode(),
        tracks = session.queue.playlist_length(),
        "game started"
    );
    sse_events::broadcast_round_opened(&state, &session, join_window);

    match join_window {
        Some(window) => {
            session.lifecycle.transition(SessionEvent::OpenJoinWindow)?;
            schedule_first_round(state.clone(), handle.clone(), window);
        }
        None => advance_round(&state, &mut session).await,
    }

    Ok(GameSnapshot::from(&*session))
}

/// Presence join, or opt-in during a competitive game.
pub async fn join(state: &SharedState, room: &str, participant: &str) -> Result<bool, ServiceError> {
    let handle = session_handle(state, room)?;
    let mut session = handle.lock().await;
    ensure_running(&session)?;

    let joined = session.join(participant, Instant::now());
    if joined {
        info!(room, participant, "participant joined");
    }
    Ok(joined)
}

/// Presence departure; the host leaving or the room emptying ends the game.
pub async fn leave(state: &SharedState, room: &str, participant: &str) -> Result<(), ServiceError> {
    let handle = session_handle(state, room)?;
    detached(depart(state.clone(), handle, participant.to_owned())).await?
}

async fn depart(
    state: SharedState,
    handle: Arc<SessionHandle>,
    participant: String,
) -> Result<(), ServiceError> {
    let mut session = handle.lock().await;
    ensure_running(&session)?;

    match session.leave(&participant, Instant::now()) {
        Departure::HostLeft => finish_locked(&state, &mut session, EndReason::HostLeft).await,
        Departure::RoomEmpty => finish_locked(&state, &mut session, EndReason::Other).await,
        Departure::Left => info!(room = %session.room, %participant, "participant left"),
        Departure::Ignored => debug!(room = %session.room, %participant, "ignored departure"),
    }
    Ok(())
}

/// Apply a guess in arrival order. Anything that does not match is a plain miss.
pub async fn guess(
    state: &SharedState,
    room: &str,
    request: GuessRequest,
) -> Result<GuessOutcome, ServiceError> {
    let handle = session_handle(state, room)?;
    let expected = handle.mode().guess_surface();
    if request.surface != expected {
        return Err(ServiceError::InvalidInput(format!(
            "guesses for this game are accepted on the {expected:?} surface"
        )));
    }

    let mut session = handle.lock().await;
    if session.lifecycle.is_ended() {
        debug!(room, participant = %request.participant, "guess rejected: game is over");
        return Ok(GuessOutcome::miss());
    }

    let outcome = session.guess(&request.participant, &request.text);
    if !outcome.correct {
        return Ok(outcome);
    }

    sse_events::broadcast_guess_accepted(state, room, &request.participant, &outcome);
    if session.mode() == GameMode::Competitive && outcome.completed {
        let position = session
            .round
            .as_ref()
            .map(|round| round.double_guessers().len())
            .unwrap_or_default();
        sse_events::broadcast_guess_completed(
            state,
            room,
            &request.participant,
            position,
            outcome.elapsed_ms.unwrap_or_default(),
        );
    }

    if outcome.stop_playback {
        stop_playback(&session).await;
    }
    Ok(outcome)
}

/// Give up on the current round; when everybody passed, playback stops.
pub async fn pass(state: &SharedState, room: &str, participant: &str) -> Result<PassOutcome, ServiceError> {
    let handle = session_handle(state, room)?;
    let mut session = handle.lock().await;
    ensure_running(&session)?;

    let outcome = session.pass(participant).map_err(|rejection| match rejection {
        PassRejection::NoRound => ServiceError::InvalidState("no round is open".into()),
        PassRejection::NotParticipant => {
            ServiceError::InvalidInput(format!("{participant} is not taking part in this game"))
        }
        PassRejection::AlreadyPassed => {
            ServiceError::Conflict(format!("{participant} already passed this round"))
        }
    })?;

    sse_events::broadcast_participant_passed(state, room, participant, outcome);
    if outcome.everybody_passed() {
        stop_playback(&session).await;
    }
    Ok(outcome)
}

/// The current track stopped: settle the round, then continue or end the game.
pub async fn track_ended(
    state: &SharedState,
    room: &str,
    reason: Option<&str>,
) -> Result<(), ServiceError> {
    if let Some(reason) = reason {
        let reason = reason.replace('_', "").to_ascii_lowercase();
        if IGNORED_END_REASONS.contains(&reason.as_str()) {
            debug!(room, reason = %reason, "ignored track end");
            return Ok(());
        }
    }

    let Some(handle) = state.registry().get(room) else {
        return Ok(());
    };
    detached(settle_and_advance(state.clone(), handle)).await
}

async fn settle_and_advance(state: SharedState, handle: Arc<SessionHandle>) {
    let mut session = handle.lock().await;
    if session.lifecycle.is_ended() {
        return;
    }

    let Some(title) = session.round.as_ref().map(|round| round.title().to_owned()) else {
        debug!(room = %session.room, "track end without an open round");
        return;
    };
    let Some(settlement) = session.settle_round() else {
        return;
    };
    sse_events::broadcast_round_settled(&state, &session, &title, settlement);

    match session.end_condition() {
        Some(reason) => finish_locked(&state, &mut session, reason).await,
        None => advance_round(&state, &mut session).await,
    }
}

/// Playback failed mid-track: the track does not count, skip to the next one.
pub async fn track_failed(state: &SharedState, room: &str, message: &str) -> Result<(), ServiceError> {
    let Some(handle) = state.registry().get(room) else {
        return Ok(());
    };
    detached(skip_failed_track(state.clone(), handle, message.to_owned())).await
}

async fn skip_failed_track(state: SharedState, handle: Arc<SessionHandle>, message: String) {
    let mut session = handle.lock().await;
    if session.lifecycle.is_ended() {
        return;
    }

    let title = session
        .queue
        .now_playing()
        .map(|track| track.info.title.clone())
        .unwrap_or_default();
    if session.discard_round().is_none() {
        debug!(room = %session.room, error = %message, "playback exception without an open round");
        return;
    }
    warn!(room = %session.room, track = %title, error = %message, "playback failed; skipping");

    session.queue.discount_current();
    let room = session.room.clone();
    sse_events::broadcast_playback_failed(&state, &room, &title, &message);
    advance_round(&state, &mut session).await;
}

/// Playback is stuck for `threshold`; announce the wait and clear it afterwards.
///
/// Returns whether a notice was published.
pub fn track_stalled(state: &SharedState, room: &str, threshold: Duration) -> bool {
    if threshold < state.config().stalled_notice_min() {
        return false;
    }
    if state.registry().get(room).is_none() {
        return false;
    }

    let wait_secs = threshold.as_millis().div_ceil(1_000) as u64;
    warn!(room, wait_secs, "playback stalled");
    sse_events::broadcast_playback_stalled(state, room, wait_secs);

    let state = state.clone();
    let room = room.to_owned();
    tokio::spawn(async move {
        sleep(threshold).await;
        sse_events::broadcast_playback_recovered(&state, &room, wait_secs);
    });
    true
}

/// The hosting context became unusable.
pub async fn context_lost(
    state: &SharedState,
    room: &str,
    kind: ContextLossKind,
) -> Result<(), ServiceError> {
    let reason = match kind {
        ContextLossKind::TextChannelDeleted => EndReason::ContextDestroyed,
        ContextLossKind::VoiceChannelDeleted => EndReason::Other,
        ContextLossKind::GuildUnavailable => EndReason::ContextInaccessible,
    };
    end_game(state, room, reason).await
}

/// Manual stop.
pub async fn stop(state: &SharedState, room: &str) -> Result<(), ServiceError> {
    end_game(state, room, EndReason::Other).await
}

/// Read-only view of the game running in `room`.
pub async fn snapshot(state: &SharedState, room: &str) -> Result<GameSnapshot, ServiceError> {
    let handle = session_handle(state, room)?;
    let session = handle.lock().await;
    Ok(GameSnapshot::from(&*session))
}

async fn end_game(state: &SharedState, room: &str, reason: EndReason) -> Result<(), ServiceError> {
    let handle = session_handle(state, room)?;
    let state = state.clone();
    detached(async move {
        let mut session = handle.lock().await;
        finish_locked(&state, &mut session, reason).await;
    })
    .await
}

/// Run session work that talks to the player on its own task, so a dropped request
/// cannot leave a round half settled or a track load half planned.
async fn detached<T>(work: impl Future<Output = T> + Send + 'static) -> Result<T, ServiceError>
where
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|err| ServiceError::Internal(format!("session task failed: {err}")))
}

fn session_handle(state: &SharedState, room: &str) -> Result<Arc<SessionHandle>, ServiceError> {
    state
        .registry()
        .get(room)
        .ok_or_else(|| ServiceError::NotFound(format!("no game is running in room {room}")))
}

fn ensure_running(session: &GameSession) -> Result<(), ServiceError> {
    if session.lifecycle.is_ended() {
        return Err(ServiceError::NotFound(format!(
            "no game is running in room {}",
            session.room
        )));
    }
    Ok(())
}

async fn stop_playback(session: &GameSession) {
    if let Err(err) = session.queue.stop_playback().await {
        warn!(room = %session.room, error = %err, "failed to stop playback");
    }
}

fn schedule_first_round(state: SharedState, handle: Arc<SessionHandle>, window: Duration) {
    tokio::spawn(async move {
        sleep(window).await;

        let mut session = handle.lock().await;
        if session.lifecycle.is_ended() {
            return;
        }
        if session.participants.is_empty() {
            info!(room = %session.room, "nobody joined the game");
            finish_locked(&state, &mut session, EndReason::Other).await;
            return;
        }
        advance_round(&state, &mut session).await;
    });
}

/// Start the next playable track, skipping entries that fail, or end the game when none is left.
async fn advance_round(state: &SharedState, session: &mut GameSession) {
    let plan = match session.lifecycle.plan(SessionEvent::LoadTrack) {
        Ok(plan) => plan,
        Err(err) => {
            warn!(room = %session.room, error = %err, "cannot load next track");
            return;
        }
    };

    loop {
        match session.queue.next().await {
            Advance::Started {
                track,
                window,
                round,
            } => {
                session.round = Some(round);
                if let Err(err) = session.lifecycle.apply(plan.id) {
                    warn!(room = %session.room, error = %err, "failed to apply track load");
                }
                if let Err(err) = session.lifecycle.transition(SessionEvent::RoundOpened) {
                    warn!(room = %session.room, error = %err, "failed to open round");
                }
                debug!(
                    room = %session.room,
                    track = %track.info.title,
                    start_ms = window.start_ms,
                    "round opened"
                );
                sse_events::broadcast_round_started(state, session, &track, window);
                return;
            }
            Advance::Failed { display, reason } => {
                sse_events::broadcast_playback_failed(state, &session.room, &display, &reason);
            }
            Advance::Exhausted => {
                if let Err(err) = session.lifecycle.abort(plan.id) {
                    warn!(room = %session.room, error = %err, "failed to abort track load");
                }
                finish_locked(state, session, EndReason::PlaylistExhausted).await;
                return;
            }
        }
    }
}

/// End the game once: unregister it, release the player, announce and persist the results.
async fn finish_locked(state: &SharedState, session: &mut GameSession, reason: EndReason) {
    if session.lifecycle.is_ended() {
        return;
    }
    if let Err(err) = session.lifecycle.transition(SessionEvent::Finish(reason)) {
        warn!(room = %session.room, error = %err, "failed to end game");
        return;
    }

    state.registry().remove(&session.room, session.id);
    session.discard_round();
    session.queue.end().await;
    info!(
        room = %session.room,
        session = %session.id,
        reason = ?reason,
        tracks_played = session.queue.tracks_played(),
        "game ended"
    );

    if reason.announces() {
        sse_events::broadcast_session_ended(state, session, reason);
    }
    if !reason.persists() {
        return;
    }
    if !session.worth_persisting() {
        debug!(room = %session.room, "game too short to record");
        return;
    }

    let awards = session.awards(Instant::now());
    match award_service::record_awards(state, &session.room, awards).await {
        Ok(progress) if reason.announces() => {
            sse_events::broadcast_session_awards(state, session, progress);
        }
        Ok(_) => {}
        Err(err) => warn!(room = %session.room, error = %err, "failed to record game awards"),
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::{Receiver, error::TryRecvError};

    use super::*;
    use crate::{
        audio::fake::{FakePlayer, PlayerCall, search_hit},
        config::AppConfig,
        dao::member_store::memory::InMemoryMemberStore,
        dto::{
            game::TrackEntryInput,
            sse::ServerEvent,
        },
        state::{
            AppState,
            game::{AcceptedAnswer, GuessKind},
            modes::GuessSurface,
            serializer::SerialGuard,
        },
    };

    struct Harness {
        state: SharedState,
        player: Arc<FakePlayer>,
        store: Arc<InMemoryMemberStore>,
        events: Receiver<ServerEvent>,
    }

    async fn harness(player: FakePlayer, config: AppConfig) -> Harness {
        let player = Arc::new(player);
        let store = Arc::new(InMemoryMemberStore::new());
        let state = AppState::new(config, player.clone());
        state.set_member_store(store.clone()).await;
        let events = state.sse().subscribe();
        Harness {
            state,
            player,
            store,
            events,
        }
    }

    fn player() -> FakePlayer {
        FakePlayer::new()
            .with_track("t1", "Shape of You", &["Ed Sheeran"], 240_000)
            .with_track("t2", "Blank Space", &["Taylor Swift"], 240_000)
            .with_track("t3", "Stay", &["Justin Bieber", "The Kid LAROI"], 240_000)
    }

    fn encoded(ids: &[&str]) -> Vec<TrackEntryInput> {
        ids.iter()
            .map(|id| TrackEntryInput::Encoded {
                encoded: (*id).to_owned(),
            })
            .collect()
    }

    fn request(mode: GameMode, accepted: AcceptedAnswer, tracks: Vec<TrackEntryInput>) -> StartGameRequest {
        StartGameRequest {
            host: "host".into(),
            mode,
            accepted_answer: accepted,
            goal: None,
            limit: None,
            playlist_name: "Hits".into(),
            shuffle: false,
            participants: vec!["p1".into()],
            tracks,
        }
    }

    fn guess_request(participant: &str, text: &str, surface: GuessSurface) -> GuessRequest {
        GuessRequest {
            participant: participant.into(),
            text: text.into(),
            surface,
        }
    }

    fn drain(events: &mut Receiver<ServerEvent>) -> Vec<String> {
        let mut names = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => names.extend(event.event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => return names,
            }
        }
    }

    #[tokio::test]
    async fn standard_game_plays_scores_and_records() {
        let mut h = harness(player(), AppConfig::default()).await;
        let started = start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2"])),
        )
        .await
        .unwrap();
        assert_eq!(started.phase, "open");
        assert_eq!(started.participants.len(), 2);

        let shared = GuessSurface::Shared;
        let miss = guess(&h.state, "room", guess_request("p1", "perfect", shared)).await.unwrap();
        assert!(!miss.correct);
        let hit = guess(&h.state, "room", guess_request("p1", "shape of you", shared)).await.unwrap();
        assert!(hit.correct && hit.stop_playback);
        assert_eq!(h.player.stops(), 1);

        track_ended(&h.state, "room", Some("stopped")).await.unwrap();
        guess(&h.state, "room", guess_request("p1", "taylor swift", shared)).await.unwrap();
        track_ended(&h.state, "room", Some("finished")).await.unwrap();

        assert!(h.state.registry().get("room").is_none());
        assert_eq!(h.player.played(), vec!["t1".to_string(), "t2".to_string()]);

        let p1 = h.store.get("room", "p1").unwrap();
        assert_eq!(p1.games_played, 1);
        assert_eq!(p1.games_won, 1);
        let host = h.store.get("room", "host").unwrap();
        assert_eq!(host.games_played, 1);
        assert_eq!(host.games_won, 0);

        let names = drain(&mut h.events);
        assert_eq!(names.first().map(String::as_str), Some("round.opened"));
        assert!(names.iter().any(|name| name == "round.settled"));
        assert!(names.iter().any(|name| name == "session.ended"));
        assert!(names.contains(&"guess.accepted".to_string()));
    }

    #[tokio::test]
    async fn goal_below_minimum_and_duplicate_rooms_are_rejected() {
        let h = harness(player(), AppConfig::default()).await;
        let mut low_goal = request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1"]));
        low_goal.goal = Some(1);
        let err = start_game(&h.state, "room", low_goal).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1"])),
        )
        .await
        .unwrap();
        let err = start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t2"])),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn limit_ends_game_without_persisting_single_track() {
        let h = harness(player(), AppConfig::default()).await;
        let mut limited = request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2"]));
        limited.limit = Some(1);
        start_game(&h.state, "room", limited).await.unwrap();

        track_ended(&h.state, "room", None).await.unwrap();
        assert!(h.state.registry().get("room").is_none());
        assert_eq!(h.player.played(), vec!["t1".to_string()]);
        assert!(h.store.get("room", "p1").is_none());
    }

    #[tokio::test]
    async fn replaced_track_end_is_ignored() {
        let h = harness(player(), AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2"])),
        )
        .await
        .unwrap();

        track_ended(&h.state, "room", Some("REPLACED")).await.unwrap();
        track_ended(&h.state, "room", Some("load_failed")).await.unwrap();
        let view = snapshot(&h.state, "room").await.unwrap();
        assert_eq!(view.tracks_played, 1);
        assert!(view.leaderboard.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_entries_are_skipped() {
        let player = player().with_search(
            "ytsearch:Shape of You - Ed Sheeran",
            search_hit("t1", "Shape of You", &["Ed Sheeran"]),
        );
        let mut h = harness(player, AppConfig::default()).await;
        let tracks = vec![
            TrackEntryInput::Descriptor {
                title: "Unknown Song".into(),
                artists: vec!["Nobody".into()],
                color: None,
                image: None,
            },
            TrackEntryInput::Descriptor {
                title: "Shape of You".into(),
                artists: vec!["Ed Sheeran".into()],
                color: None,
                image: None,
            },
        ];

        let started = start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, tracks),
        )
        .await
        .unwrap();

        assert_eq!(started.playlist_length, 1);
        assert_eq!(started.tracks_played, 1);
        assert!(drain(&mut h.events).contains(&"playback.failed".to_string()));
    }

    #[tokio::test]
    async fn playback_exception_discounts_track_and_advances() {
        let h = harness(player(), AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2", "t3"])),
        )
        .await
        .unwrap();

        track_failed(&h.state, "room", "decoder crashed").await.unwrap();
        let view = snapshot(&h.state, "room").await.unwrap();
        assert_eq!(view.playlist_length, 2);
        assert_eq!(view.tracks_played, 1);
        assert_eq!(h.player.played().len(), 2);
    }

    #[tokio::test]
    async fn host_leaving_ends_game() {
        let h = harness(player(), AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2"])),
        )
        .await
        .unwrap();

        leave(&h.state, "room", "p1").await.unwrap();
        assert!(h.state.registry().get("room").is_some());
        leave(&h.state, "room", "host").await.unwrap();
        assert!(h.state.registry().get("room").is_none());
        assert!(h.player.calls().contains(&PlayerCall::Leave("room".into())));
    }

    #[tokio::test]
    async fn pass_rules_and_everybody_passing_stops_playback() {
        let h = harness(player(), AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2"])),
        )
        .await
        .unwrap();

        let first = pass(&h.state, "room", "p1").await.unwrap();
        assert_eq!((first.passed, first.total), (1, 2));
        let again = pass(&h.state, "room", "p1").await.unwrap_err();
        assert!(matches!(again, ServiceError::Conflict(_)));

        let passed = guess(&h.state, "room", guess_request("p1", "shape of you", GuessSurface::Shared))
            .await
            .unwrap();
        assert!(!passed.correct);

        pass(&h.state, "room", "host").await.unwrap();
        assert_eq!(h.player.stops(), 1);
    }

    #[tokio::test]
    async fn context_destroyed_skips_announcements_but_records() {
        let mut h = harness(player(), AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2", "t3"])),
        )
        .await
        .unwrap();
        track_ended(&h.state, "room", None).await.unwrap();
        drain(&mut h.events);

        context_lost(&h.state, "room", ContextLossKind::TextChannelDeleted)
            .await
            .unwrap();

        assert!(drain(&mut h.events).is_empty());
        assert_eq!(h.store.get("room", "p1").map(|m| m.games_played), Some(1));
    }

    #[tokio::test]
    async fn inaccessible_context_skips_persistence() {
        let h = harness(player(), AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2", "t3"])),
        )
        .await
        .unwrap();
        track_ended(&h.state, "room", None).await.unwrap();

        context_lost(&h.state, "room", ContextLossKind::GuildUnavailable)
            .await
            .unwrap();
        assert!(h.store.get("room", "p1").is_none());
        assert!(h.state.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn competitive_game_waits_for_joins_and_scores_privately() {
        let config = AppConfig::default().with_join_window(Duration::from_secs(10));
        let h = harness(player(), config).await;

        let started = start_game(
            &h.state,
            "room",
            request(GameMode::Competitive, AcceptedAnswer::Title, encoded(&["t3", "t1"])),
        )
        .await
        .unwrap();
        assert_eq!(started.phase, "joining");
        assert_eq!(started.accepted_answer, AcceptedAnswer::Both);
        assert!(started.participants.is_empty());

        assert!(join(&h.state, "room", "p1").await.unwrap());
        assert!(join(&h.state, "room", "p2").await.unwrap());
        sleep(Duration::from_secs(11)).await;
        assert_eq!(snapshot_phase(&h.state).await, "open");

        let private = GuessSurface::Private;
        let wrong_surface = guess(&h.state, "room", guess_request("p1", "stay", GuessSurface::Shared)).await;
        assert!(matches!(wrong_surface, Err(ServiceError::InvalidInput(_))));

        let title = guess(&h.state, "room", guess_request("p1", "stay", private)).await.unwrap();
        assert_eq!(title.kind, Some(GuessKind::Title));
        let done = guess(&h.state, "room", guess_request("p1", "justin bieber", private)).await.unwrap();
        assert!(done.completed && !done.stop_playback);
        guess(&h.state, "room", guess_request("p2", "justin bieber", private)).await.unwrap();
        let last = guess(&h.state, "room", guess_request("p2", "stay", private)).await.unwrap();
        assert!(last.stop_playback);

        let outsider = guess(&h.state, "room", guess_request("p3", "stay", private)).await.unwrap();
        assert!(!outsider.correct);

        track_ended(&h.state, "room", None).await.unwrap();
        let view = snapshot(&h.state, "room").await.unwrap();
        let p1 = view.participants.iter().find(|p| p.id == "p1").unwrap();
        let p2 = view.participants.iter().find(|p| p.id == "p2").unwrap();
        assert_eq!(p1.score, 2.5);
        assert_eq!(p2.score, 2.0);
    }

    async fn apply_guess<'a>(
        turn: impl Future<Output = SerialGuard<'a, GameSession>>,
        participant: &str,
        text: &str,
    ) -> GuessOutcome {
        let mut session = turn.await;
        tokio::task::yield_now().await;
        session.guess(participant, text)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_guesses_apply_in_arrival_order() {
        let config = AppConfig::default().with_join_window(Duration::from_secs(10));
        let h = harness(player(), config).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Competitive, AcceptedAnswer::Both, encoded(&["t1", "t2"])),
        )
        .await
        .unwrap();
        for participant in ["p1", "p2", "p3"] {
            assert!(join(&h.state, "room", participant).await.unwrap());
        }
        sleep(Duration::from_secs(11)).await;
        assert_eq!(snapshot_phase(&h.state).await, "open");

        let handle = h.state.registry().get("room").unwrap();
        let first = handle.lock();
        let second = handle.lock();
        let third = handle.lock();
        tokio::join!(
            apply_guess(third, "p3", "shape of you"),
            apply_guess(second, "p2", "shape of you"),
            apply_guess(first, "p1", "shape of you"),
        );

        let first = handle.lock();
        let second = handle.lock();
        let third = handle.lock();
        let (last, _, _) = tokio::join!(
            apply_guess(third, "p3", "ed sheeran"),
            apply_guess(second, "p2", "ed sheeran"),
            apply_guess(first, "p1", "ed sheeran"),
        );
        assert!(last.completed && last.stop_playback);

        let session = handle.lock().await;
        let round = session.round.as_ref().unwrap();
        let order: Vec<&str> = round.title_guessers().iter().map(String::as_str).collect();
        assert_eq!(order, vec!["p1", "p2", "p3"]);
        assert_eq!(round.double_guessers().to_vec(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_track_end_request_still_opens_next_round() {
        let player = player().slow_decode("t2", Duration::from_millis(500));
        let h = harness(player, AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1", "t2", "t3"])),
        )
        .await
        .unwrap();

        let call = track_ended(&h.state, "room", None);
        assert!(tokio::time::timeout(Duration::from_millis(100), call).await.is_err());
        sleep(Duration::from_secs(1)).await;

        let view = snapshot(&h.state, "room").await.unwrap();
        assert_eq!(view.phase, "open");
        assert_eq!(view.tracks_played, 2);
        assert_eq!(h.player.played(), vec!["t1".to_string(), "t2".to_string()]);

        let hit = guess(&h.state, "room", guess_request("p1", "blank space", GuessSurface::Shared))
            .await
            .unwrap();
        assert!(hit.correct);

        track_ended(&h.state, "room", None).await.unwrap();
        assert_eq!(h.player.played().last().map(String::as_str), Some("t3"));
        assert_eq!(snapshot(&h.state, "room").await.unwrap().tracks_played, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn competitive_game_without_joins_ends() {
        let config = AppConfig::default().with_join_window(Duration::from_secs(10));
        let h = harness(player(), config).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Competitive, AcceptedAnswer::Both, encoded(&["t1"])),
        )
        .await
        .unwrap();

        sleep(Duration::from_secs(11)).await;
        assert!(h.state.registry().get("room").is_none());
        assert!(h.player.played().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_notice_is_cleared_after_threshold() {
        let mut h = harness(player(), AppConfig::default()).await;
        start_game(
            &h.state,
            "room",
            request(GameMode::Standard, AcceptedAnswer::Either, encoded(&["t1"])),
        )
        .await
        .unwrap();
        drain(&mut h.events);

        assert!(!track_stalled(&h.state, "room", Duration::from_millis(500)));
        assert!(track_stalled(&h.state, "room", Duration::from_millis(2_500)));
        assert_eq!(drain(&mut h.events), vec!["playback.stalled".to_string()]);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(drain(&mut h.events), vec!["playback.recovered".to_string()]);
    }

    async fn snapshot_phase(state: &SharedState) -> String {
        snapshot(state, "room").await.unwrap().phase
    }
}
