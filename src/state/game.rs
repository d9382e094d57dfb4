use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    modes::{GameMode, RoundRules},
    round::RoundData,
    scoreboard::{ScoreBoard, ScoreEntry, StreakCounter},
    state_machine::{EndReason, SessionLifecycle},
};
use crate::queue::TrackQueue;

/// Identifier of a participant, as given by the chat layer.
pub type ParticipantId = String;
/// Identifier of the room (guild) hosting a session.
pub type RoomId = String;

/// Which answers end a Standard round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AcceptedAnswer {
    /// Only the title.
    Title,
    /// Only the primary artist.
    Artist,
    /// Title or primary artist.
    #[default]
    Either,
    /// Title and primary artist, possibly from two participants.
    Both,
}

impl AcceptedAnswer {
    /// Sentence shown in the round-opened notice.
    pub fn describe(self) -> &'static str {
        match self {
            AcceptedAnswer::Title => "Guess the title of the song",
            AcceptedAnswer::Artist => "Guess the artist of the song",
            AcceptedAnswer::Either => "Guess the title or the artist of the song",
            AcceptedAnswer::Both => "Guess both the title and the artist of the song",
        }
    }
}

/// What a correct guess matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuessKind {
    /// The track title.
    Title,
    /// The headline artist.
    Artist,
    /// A featured artist.
    FeaturedArtist,
}

/// Result of one guess.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GuessOutcome {
    /// The guess matched something.
    pub correct: bool,
    /// What it matched.
    pub kind: Option<GuessKind>,
    /// First of two required answers found.
    pub halfway: bool,
    /// The guesser (or the room) has found everything required.
    pub completed: bool,
    /// Playback should stop now.
    pub stop_playback: bool,
    /// Time since the round opened when the guess completed it.
    pub elapsed_ms: Option<u64>,
}

impl GuessOutcome {
    /// No match.
    pub fn miss() -> Self {
        Self {
            correct: false,
            kind: None,
            halfway: false,
            completed: false,
            stop_playback: false,
            elapsed_ms: None,
        }
    }

    /// Plain match without side effects.
    pub fn hit(kind: GuessKind) -> Self {
        Self {
            correct: true,
            kind: Some(kind),
            ..Self::miss()
        }
    }
}

/// Outcome of settling a round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoundSettlement {
    /// The round counts as solved.
    pub solved: bool,
    /// Who solved it, in order.
    pub solvers: Vec<ParticipantId>,
    /// The single half found in an unsolved both-answers round.
    pub partial: Option<GuessKind>,
    /// Every participant passed; nothing was scored.
    pub everybody_passed: bool,
    /// Current streak leader, when they are among the solvers.
    pub streak_leader: Option<(ParticipantId, u32)>,
}

impl RoundSettlement {
    /// Nothing happened.
    pub fn unsolved() -> Self {
        Self::default()
    }
}

/// Why a pass was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassRejection {
    /// No round is open.
    NoRound,
    /// Only participants may pass.
    NotParticipant,
    /// Already passed this round.
    AlreadyPassed,
}

/// Accepted pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    /// Participants who passed so far.
    pub passed: usize,
    /// Participants in the session.
    pub total: usize,
}

impl PassOutcome {
    /// Every participant gave up on the round.
    pub fn everybody_passed(&self) -> bool {
        self.passed >= self.total
    }
}

/// Result of a presence departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The host left; the session must end.
    HostLeft,
    /// A participant left and nobody is listening any more.
    RoomEmpty,
    /// A participant left; others remain.
    Left,
    /// Not a participant, or already absent.
    Ignored,
}

/// Someone taking part in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Identifier.
    pub id: ParticipantId,
    /// Last time they (re)joined; `None` while absent.
    pub last_entry: Option<Instant>,
    /// Listening time accumulated over previous presence periods.
    pub listened: Duration,
    /// Rounds they were present for when the track ended.
    pub rounds_listened: u32,
}

impl Participant {
    /// Participant present from `now`.
    pub fn new(id: impl Into<ParticipantId>, now: Instant) -> Self {
        Self {
            id: id.into(),
            last_entry: Some(now),
            listened: Duration::ZERO,
            rounds_listened: 0,
        }
    }

    /// Whether they are currently listening.
    pub fn is_present(&self) -> bool {
        self.last_entry.is_some()
    }

    /// Start a new presence period. Returns false if already present.
    pub fn rejoin(&mut self, now: Instant) -> bool {
        if self.last_entry.is_some() {
            return false;
        }
        self.last_entry = Some(now);
        true
    }

    /// Close the current presence period. Returns false if already absent.
    pub fn leave(&mut self, now: Instant) -> bool {
        match self.last_entry.take() {
            Some(entered) => {
                self.listened += now.saturating_duration_since(entered);
                true
            }
            None => false,
        }
    }

    /// Total listening time, counting the open presence period up to `now`.
    pub fn listen_time(&self, now: Instant) -> Duration {
        let current = self
            .last_entry
            .map(|entered| now.saturating_duration_since(entered))
            .unwrap_or_default();
        self.listened + current
    }
}

/// Points earned by one participant when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Award {
    /// Participant.
    pub participant: ParticipantId,
    /// In-game score.
    pub score: f64,
    /// Long-term points earned.
    pub points: i64,
    /// Rounds they listened to.
    pub rounds_listened: u32,
    /// Listening time.
    pub listen_time: Duration,
    /// Whether they won the session.
    pub winner: bool,
}

/// Per-session settings fixed at start.
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Participant who started the game.
    pub host: ParticipantId,
    /// Game flavour.
    pub mode: GameMode,
    /// Accepted-answer policy.
    pub accepted_answer: AcceptedAnswer,
    /// Score ending the game when reached.
    pub goal: Option<u32>,
    /// Number of tracks after which the game ends.
    pub limit: Option<u32>,
    /// Display name of the playlist.
    pub playlist_name: String,
    /// Competitive placement bonuses.
    pub placement_bonuses: Vec<f64>,
}

const WINNER_MULTIPLIER: f64 = 1500.0;
const BASE_MULTIPLIER: f64 = 1000.0;
/// Entries kept in leaderboard snapshots.
pub const LEADERBOARD_SIZE: usize = 10;

/// Everything a running game owns.
pub struct GameSession {
    /// Unique id of this run.
    pub id: Uuid,
    /// Hosting room.
    pub room: RoomId,
    /// Settings fixed at start.
    pub settings: GameSettings,
    /// Lifecycle phase.
    pub lifecycle: SessionLifecycle,
    /// Participants keyed by id, in enrollment order.
    pub participants: IndexMap<ParticipantId, Participant>,
    /// Playlist being played.
    pub queue: TrackQueue,
    /// Game score per participant.
    pub scoreboard: ScoreBoard,
    /// Consecutive solved rounds per participant.
    pub streaks: StreakCounter,
    /// Round currently open.
    pub round: Option<RoundData>,
    /// Wall-clock creation time.
    pub created_at: SystemTime,
    /// Monotonic creation time.
    pub started_at: Instant,
}

impl GameSession {
    /// Build a session in the `Created` phase.
    pub fn new(room: impl Into<RoomId>, settings: GameSettings, queue: TrackQueue) -> Self {
        Self {
            id: Uuid::new_v4(),
            room: room.into(),
            settings,
            lifecycle: SessionLifecycle::new(),
            participants: IndexMap::new(),
            queue,
            scoreboard: ScoreBoard::new(),
            streaks: StreakCounter::new(),
            round: None,
            created_at: SystemTime::now(),
            started_at: Instant::now(),
        }
    }

    /// Game flavour.
    pub fn mode(&self) -> GameMode {
        self.settings.mode
    }

    /// Enroll the participants the mode takes from the present members.
    pub fn seed_participants(&mut self, present: &[ParticipantId], now: Instant) {
        for id in self.mode().initial_participants(present) {
            self.participants
                .entry(id.clone())
                .or_insert_with(|| Participant::new(id, now));
        }
    }

    /// Enroll or re-admit a participant. Returns false if they were already present.
    pub fn join(&mut self, id: &str, now: Instant) -> bool {
        match self.participants.get_mut(id) {
            Some(participant) => participant.rejoin(now),
            None => {
                self.participants
                    .insert(id.to_owned(), Participant::new(id, now));
                true
            }
        }
    }

    /// Record someone leaving the listening context.
    pub fn leave(&mut self, id: &str, now: Instant) -> Departure {
        if id == self.settings.host {
            if let Some(participant) = self.participants.get_mut(id) {
                participant.leave(now);
            }
            return Departure::HostLeft;
        }

        let Some(participant) = self.participants.get_mut(id) else {
            return Departure::Ignored;
        };
        if !participant.leave(now) {
            return Departure::Ignored;
        }

        if self.participants.values().any(Participant::is_present) {
            Departure::Left
        } else {
            Departure::RoomEmpty
        }
    }

    /// Apply a guess to the open round. Anything unusable is simply a miss.
    pub fn guess(&mut self, participant: &str, raw: &str) -> GuessOutcome {
        if self.mode() == GameMode::Competitive && !self.participants.contains_key(participant) {
            return GuessOutcome::miss();
        }
        let rules = RoundRules {
            accepted: self.settings.accepted_answer,
            participant_count: self.participants.len(),
            placement_bonuses: &self.settings.placement_bonuses,
        };
        let Some(round) = self.round.as_mut() else {
            return GuessOutcome::miss();
        };
        if round.has_passed(participant) {
            return GuessOutcome::miss();
        }
        self.settings.mode.guess(round, &rules, participant, raw)
    }

    /// Give up on the open round.
    pub fn pass(&mut self, participant: &str) -> Result<PassOutcome, PassRejection> {
        let total = self.participants.len();
        if !self.participants.contains_key(participant) {
            return Err(PassRejection::NotParticipant);
        }
        let round = self.round.as_mut().ok_or(PassRejection::NoRound)?;
        if !round.pass(participant) {
            return Err(PassRejection::AlreadyPassed);
        }
        Ok(PassOutcome {
            passed: round.passed_count(),
            total,
        })
    }

    /// Close the open round: score it, update streaks and credit present listeners.
    pub fn settle_round(&mut self) -> Option<RoundSettlement> {
        let round = self.round.take()?;
        let rules = RoundRules {
            accepted: self.settings.accepted_answer,
            participant_count: self.participants.len(),
            placement_bonuses: &self.settings.placement_bonuses,
        };
        let mut settlement =
            self.settings
                .mode
                .settle_round(&round, &rules, &mut self.scoreboard, &mut self.streaks);

        settlement.streak_leader = self
            .streaks
            .leader()
            .filter(|(leader, _)| settlement.solvers.contains(leader));

        for participant in self.participants.values_mut() {
            if participant.is_present() {
                participant.rounds_listened += 1;
            }
        }

        Some(settlement)
    }

    /// Drop the open round without scoring it.
    pub fn discard_round(&mut self) -> Option<RoundData> {
        self.round.take()
    }

    /// Goal or limit reached after the last settlement.
    pub fn end_condition(&self) -> Option<EndReason> {
        if let Some(goal) = self.settings.goal {
            let reached = self
                .scoreboard
                .leader()
                .is_some_and(|leader| leader.score >= f64::from(goal));
            if reached {
                return Some(EndReason::GoalMet);
            }
        }
        if let Some(limit) = self.settings.limit {
            if self.queue.tracks_played() >= limit as usize {
                return Some(EndReason::LimitReached);
            }
        }
        None
    }

    /// Winner of the session: the scoreboard leader, if anyone scored.
    pub fn winner(&self) -> Option<ScoreEntry> {
        self.scoreboard.leader().filter(|leader| leader.score > 0.0)
    }

    /// Current ranking.
    pub fn leaderboard(&self) -> Vec<ScoreEntry> {
        self.scoreboard.top(LEADERBOARD_SIZE)
    }

    /// Whether enough was played to be worth persisting.
    pub fn worth_persisting(&self) -> bool {
        self.queue.tracks_played() > 1
    }

    /// Long-term points earned by every participant.
    pub fn awards(&self, now: Instant) -> Vec<Award> {
        let winner = self.winner().map(|entry| entry.participant);
        let participant_count = self.participants.len();
        let first_bonus = self
            .settings
            .placement_bonuses
            .first()
            .copied()
            .unwrap_or_default();

        self.participants
            .values()
            .map(|participant| {
                let score = self.scoreboard.get(&participant.id);
                let is_winner = winner.as_deref() == Some(participant.id.as_str());
                let multiplier = if is_winner && participant_count > 1 {
                    WINNER_MULTIPLIER
                } else {
                    BASE_MULTIPLIER
                };
                let divisor = self.settings.mode.points_divisor(
                    participant.rounds_listened,
                    participant_count,
                    first_bonus,
                );
                let listen_time = participant.listen_time(now);
                let points = award_points(score, divisor, listen_time, multiplier);

                Award {
                    participant: participant.id.clone(),
                    score,
                    points,
                    rounds_listened: participant.rounds_listened,
                    listen_time,
                    winner: is_winner,
                }
            })
            .collect()
    }
}

/// `round(score / divisor * minutes * multiplier)`; zero when nothing was listened to.
pub fn award_points(score: f64, divisor: f64, listen_time: Duration, multiplier: f64) -> i64 {
    if divisor <= 0.0 {
        return 0;
    }
    let minutes = listen_time.as_millis() as f64 / 60_000.0;
    (score / divisor * minutes * multiplier).round() as i64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        audio::fake::FakePlayer,
        matching::FuzzyMatcher,
        queue::{QueueEntry, QueueOptions, ResolutionCache},
    };

    fn settings(mode: GameMode, accepted: AcceptedAnswer) -> GameSettings {
        GameSettings {
            host: "host".into(),
            mode,
            accepted_answer: mode.accepted_answer(accepted),
            goal: Some(10),
            limit: None,
            playlist_name: "test".into(),
            placement_bonuses: vec![1.5, 1.0, 0.5],
        }
    }

    fn session(mode: GameMode, accepted: AcceptedAnswer) -> GameSession {
        let player = Arc::new(FakePlayer::new());
        let queue = TrackQueue::new(
            "room",
            Vec::<QueueEntry>::new(),
            player,
            Arc::new(ResolutionCache::new(Duration::from_secs(60))),
            QueueOptions {
                window: Duration::from_secs(30),
                timeout: Duration::from_secs(1),
                matcher: FuzzyMatcher::default(),
            },
        );
        GameSession::new("room", settings(mode, accepted), queue)
    }

    fn open_round(session: &mut GameSession) {
        session.round = Some(RoundData::new(
            "Shape of You",
            &["Ed Sheeran".to_string()],
            FuzzyMatcher::default(),
        ));
    }

    #[test]
    fn award_formula_matches_expected_points() {
        // 3 points over 6 rounds, 5 minutes listened, winner among several players.
        let points = award_points(3.0, 6.0, Duration::from_secs(300), 1500.0);
        assert_eq!(points, 3750);
        assert_eq!(award_points(3.0, 0.0, Duration::from_secs(300), 1000.0), 0);
    }

    #[test]
    fn both_mode_half_guessers_keep_game_running_below_goal() {
        let mut session = session(GameMode::Standard, AcceptedAnswer::Both);
        let now = Instant::now();
        session.seed_participants(&["p1".to_string(), "p2".to_string()], now);

        for _ in 0..10 {
            open_round(&mut session);
            assert!(session.guess("p1", "shape of you").halfway);
            assert!(session.guess("p2", "ed sheeran").stop_playback);
            let settlement = session.settle_round().expect("round was open");
            assert!(settlement.solved);
        }

        assert_eq!(session.scoreboard.get("p1"), 5.0);
        assert_eq!(session.scoreboard.get("p2"), 5.0);
        assert_eq!(session.end_condition(), None);
        assert_eq!(session.participants["p1"].rounds_listened, 10);
    }

    #[test]
    fn reaching_goal_ends_game() {
        let mut session = session(GameMode::Standard, AcceptedAnswer::Either);
        session.seed_participants(&["p1".to_string()], Instant::now());
        for _ in 0..10 {
            open_round(&mut session);
            session.guess("p1", "shape of you");
            session.settle_round();
        }
        assert_eq!(session.end_condition(), Some(EndReason::GoalMet));
    }

    #[test]
    fn passed_participant_cannot_guess() {
        let mut session = session(GameMode::Standard, AcceptedAnswer::Either);
        session.seed_participants(&["p1".to_string(), "p2".to_string()], Instant::now());
        open_round(&mut session);

        let pass = session.pass("p1").unwrap();
        assert!(!pass.everybody_passed());
        assert_eq!(session.pass("p1"), Err(PassRejection::AlreadyPassed));
        assert!(!session.guess("p1", "shape of you").correct);
        assert_eq!(session.pass("stranger"), Err(PassRejection::NotParticipant));
    }

    #[test]
    fn streak_leader_note_only_for_solvers() {
        let mut session = session(GameMode::Standard, AcceptedAnswer::Either);
        session.seed_participants(&["p1".to_string(), "p2".to_string()], Instant::now());

        open_round(&mut session);
        session.guess("p1", "shape of you");
        let first = session.settle_round().unwrap();
        assert_eq!(first.streak_leader, Some(("p1".to_string(), 1)));

        open_round(&mut session);
        session.guess("p2", "ed sheeran");
        let second = session.settle_round().unwrap();
        assert_eq!(second.streak_leader, Some(("p2".to_string(), 1)));
        assert_eq!(session.streaks.get("p1"), 0);
    }

    #[test]
    fn presence_accumulates_listening_time() {
        let start = Instant::now();
        let mut participant = Participant::new("p1", start);
        participant.leave(start + Duration::from_secs(60));
        assert!(!participant.is_present());
        participant.rejoin(start + Duration::from_secs(120));

        let total = participant.listen_time(start + Duration::from_secs(150));
        assert_eq!(total, Duration::from_secs(90));
    }

    #[test]
    fn host_departure_is_reported() {
        let mut session = session(GameMode::Standard, AcceptedAnswer::Either);
        let now = Instant::now();
        session.seed_participants(&["host".to_string(), "p1".to_string()], now);

        assert_eq!(session.leave("p1", now), Departure::Left);
        assert_eq!(session.leave("p1", now), Departure::Ignored);
        assert_eq!(session.leave("host", now), Departure::HostLeft);
    }

    #[test]
    fn competitive_starts_empty_and_ignores_outsiders() {
        let mut session = session(GameMode::Competitive, AcceptedAnswer::Title);
        session.seed_participants(&["p1".to_string()], Instant::now());
        assert!(session.participants.is_empty());

        open_round(&mut session);
        assert!(!session.guess("p1", "shape of you").correct);
        assert!(session.join("p1", Instant::now()));
        assert!(session.guess("p1", "shape of you").correct);
    }

    #[test]
    fn winner_gets_higher_multiplier() {
        let mut session = session(GameMode::Standard, AcceptedAnswer::Either);
        let start = Instant::now();
        session.seed_participants(&["p1".to_string(), "p2".to_string()], start);
        for _ in 0..2 {
            open_round(&mut session);
            session.guess("p1", "shape of you");
            session.settle_round();
        }

        let awards = session.awards(start + Duration::from_secs(120));
        let p1 = awards.iter().find(|a| a.participant == "p1").unwrap();
        let p2 = awards.iter().find(|a| a.participant == "p2").unwrap();
        assert!(p1.winner);
        // 2 points / 2 rounds * 2 minutes * 1500
        assert_eq!(p1.points, 3000);
        assert_eq!(p2.points, 0);
        assert!(!p2.winner);
    }
}
