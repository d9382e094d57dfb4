use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use super::game::ParticipantId;

/// One line of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScoreEntry {
    /// Participant identifier.
    pub participant: ParticipantId,
    /// Accumulated value.
    pub score: f64,
}

/// Insertion-ordered running totals keyed by participant.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    scores: IndexMap<ParticipantId, f64>,
}

impl ScoreBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the participant's total, creating the entry on first use.
    pub fn inc(&mut self, participant: &str, value: f64) -> f64 {
        let total = self.scores.entry(participant.to_owned()).or_insert(0.0);
        *total += value;
        *total
    }

    /// Current total, zero when absent.
    pub fn get(&self, participant: &str) -> f64 {
        self.scores.get(participant).copied().unwrap_or(0.0)
    }

    /// Highest total; ties go to whoever was inserted first.
    pub fn leader(&self) -> Option<ScoreEntry> {
        let mut best: Option<(&ParticipantId, f64)> = None;
        for (participant, score) in &self.scores {
            match best {
                Some((_, best_score)) if *score <= best_score => {}
                _ => best = Some((participant, *score)),
            }
        }
        best.map(|(participant, score)| ScoreEntry {
            participant: participant.clone(),
            score,
        })
    }

    /// Best `limit` entries, descending, ties kept in insertion order.
    pub fn top(&self, limit: usize) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .scores
            .iter()
            .map(|(participant, score)| ScoreEntry {
                participant: participant.clone(),
                score: *score,
            })
            .collect();
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries.truncate(limit);
        entries
    }

    /// Participants in insertion order with their totals.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, f64)> {
        self.scores.iter().map(|(participant, score)| (participant, *score))
    }

    /// Number of tracked participants.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether nobody has been tracked yet.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Consecutive solved rounds per participant.
#[derive(Debug, Clone, Default)]
pub struct StreakCounter {
    board: ScoreBoard,
}

impl StreakCounter {
    /// Empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the streak of every listed participant and reset everybody else.
    pub fn inc_streak<'a, I>(&mut self, solvers: I)
    where
        I: IntoIterator<Item = &'a ParticipantId>,
    {
        let solvers: Vec<&ParticipantId> = solvers.into_iter().collect();
        for (participant, streak) in self.board.scores.iter_mut() {
            if !solvers.contains(&participant) {
                *streak = 0.0;
            }
        }
        for participant in solvers {
            self.board.inc(participant, 1.0);
        }
    }

    /// Reset every streak to zero.
    pub fn reset_all(&mut self) {
        for streak in self.board.scores.values_mut() {
            *streak = 0.0;
        }
    }

    /// Current streak of a participant.
    pub fn get(&self, participant: &str) -> u32 {
        self.board.get(participant) as u32
    }

    /// Longest running streak, if any participant has one.
    pub fn leader(&self) -> Option<(ParticipantId, u32)> {
        self.board
            .leader()
            .filter(|entry| entry.score > 0.0)
            .map(|entry| (entry.participant, entry.score as u32))
    }
}
