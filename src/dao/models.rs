use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Long-term statistics of one member within a scope (the room hosting their games).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberEntity {
    /// Member identifier.
    pub user_id: String,
    /// Scope the statistics belong to.
    pub scope_id: String,
    /// Accumulated points.
    pub points: i64,
    /// Games taken part in.
    pub games_played: u32,
    /// Games won.
    pub games_won: u32,
}

impl MemberEntity {
    /// Fresh record with no history.
    pub fn new(user_id: impl Into<String>, scope_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            scope_id: scope_id.into(),
            points: 0,
            games_played: 0,
            games_won: 0,
        }
    }

    /// `floor(0.2 * sqrt(points))`.
    pub fn level(&self) -> u32 {
        let points = self.points.max(0) as f64;
        (0.2 * points.sqrt()).floor() as u32
    }

    /// Rank earned from games won, in tiers of ten.
    pub fn rank(&self) -> MemberRank {
        MemberRank::from_games_won(self.games_won)
    }
}

/// Rank tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MemberRank {
    /// Fewer than 10 wins.
    Beginner,
    /// 10 wins.
    Experienced,
    /// 20 wins.
    Master,
    /// 30 wins.
    Divine,
    /// 40 wins and more.
    Legendary,
}

impl MemberRank {
    /// Tier for a number of games won.
    pub fn from_games_won(games_won: u32) -> Self {
        match games_won / 10 {
            0 => MemberRank::Beginner,
            1 => MemberRank::Experienced,
            2 => MemberRank::Master,
            3 => MemberRank::Divine,
            _ => MemberRank::Legendary,
        }
    }
}
