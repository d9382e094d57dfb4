//! Game modes: how guesses are routed and how a finished round is scored.

mod competitive;
mod standard;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    game::{AcceptedAnswer, GuessOutcome, ParticipantId, RoundSettlement},
    round::RoundData,
    scoreboard::{ScoreBoard, StreakCounter},
};

/// Where guesses for a mode are expected to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuessSurface {
    /// The room's shared text channel.
    Shared,
    /// A private conversation with the participant.
    Private,
}

/// Per-round inputs a mode needs besides the round itself.
#[derive(Debug, Clone, Copy)]
pub struct RoundRules<'a> {
    /// Which answers are accepted.
    pub accepted: AcceptedAnswer,
    /// Number of participants taking part.
    pub participant_count: usize,
    /// Competitive placement bonuses, first finisher first.
    pub placement_bonuses: &'a [f64],
}

/// Game flavour held by every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Everybody guesses in the shared channel; one point is split between solvers.
    #[default]
    Standard,
    /// Private guesses with partial credit and placement bonuses.
    Competitive,
}

impl GameMode {
    /// Route a guess and report what it achieved.
    pub fn guess(
        self,
        round: &mut RoundData,
        rules: &RoundRules<'_>,
        participant: &str,
        raw: &str,
    ) -> GuessOutcome {
        match self {
            GameMode::Standard => standard::guess(round, rules.accepted, participant, raw),
            GameMode::Competitive => {
                competitive::guess(round, rules.participant_count, participant, raw)
            }
        }
    }

    /// Score a finished round and update streaks.
    pub fn settle_round(
        self,
        round: &RoundData,
        rules: &RoundRules<'_>,
        scores: &mut ScoreBoard,
        streaks: &mut StreakCounter,
    ) -> RoundSettlement {
        match self {
            GameMode::Standard => standard::settle(round, rules.accepted, scores, streaks),
            GameMode::Competitive => competitive::settle(round, rules, scores, streaks),
        }
    }

    /// Normaliser applied to a participant's score when computing awarded points.
    pub fn points_divisor(self, rounds_listened: u32, participant_count: usize, first_bonus: f64) -> f64 {
        let rounds = f64::from(rounds_listened);
        match self {
            GameMode::Standard => rounds,
            GameMode::Competitive => {
                let players = participant_count.max(1) as f64;
                rounds * (1.0 + first_bonus / players)
            }
        }
    }

    /// Where guesses are accepted.
    pub fn guess_surface(self) -> GuessSurface {
        match self {
            GameMode::Standard => GuessSurface::Shared,
            GameMode::Competitive => GuessSurface::Private,
        }
    }

    /// Participants enrolled when the session starts.
    pub fn initial_participants(self, present: &[ParticipantId]) -> Vec<ParticipantId> {
        match self {
            GameMode::Standard => present.to_vec(),
            // Competitive participants opt in during the join window.
            GameMode::Competitive => Vec::new(),
        }
    }

    /// Opt-in period before the first track, if any.
    pub fn join_window(self, configured: Duration) -> Option<Duration> {
        match self {
            GameMode::Competitive if !configured.is_zero() => Some(configured),
            _ => None,
        }
    }

    /// Accepted-answer policy actually used by the mode.
    pub fn accepted_answer(self, requested: AcceptedAnswer) -> AcceptedAnswer {
        match self {
            GameMode::Standard => requested,
            GameMode::Competitive => AcceptedAnswer::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn competitive_divisor_shrinks_with_more_players() {
        let solo = GameMode::Competitive.points_divisor(10, 1, 1.5);
        let crowd = GameMode::Competitive.points_divisor(10, 3, 1.5);
        assert_eq!(solo, 25.0);
        assert_eq!(crowd, 15.0);
        assert_eq!(GameMode::Standard.points_divisor(10, 3, 1.5), 10.0);
    }

    #[test]
    fn capabilities_differ_per_mode() {
        let present = vec!["a".to_string(), "b".to_string()];
        assert_eq!(GameMode::Standard.initial_participants(&present), present);
        assert!(GameMode::Competitive.initial_participants(&present).is_empty());
        assert_eq!(GameMode::Competitive.guess_surface(), GuessSurface::Private);
        assert_eq!(
            GameMode::Competitive.accepted_answer(AcceptedAnswer::Title),
            AcceptedAnswer::Both
        );
        assert_eq!(GameMode::Standard.join_window(Duration::from_secs(10)), None);
        assert_eq!(GameMode::Competitive.join_window(Duration::ZERO), None);
    }
}
