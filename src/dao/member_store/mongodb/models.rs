use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::MemberEntity;

/// Stored shape of a member record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMemberDocument {
    user_id: String,
    scope_id: String,
    points: i64,
    games_played: i64,
    games_won: i64,
}

impl From<MemberEntity> for MongoMemberDocument {
    fn from(value: MemberEntity) -> Self {
        Self {
            user_id: value.user_id,
            scope_id: value.scope_id,
            points: value.points,
            games_played: i64::from(value.games_played),
            games_won: i64::from(value.games_won),
        }
    }
}

impl From<MongoMemberDocument> for MemberEntity {
    fn from(value: MongoMemberDocument) -> Self {
        Self {
            user_id: value.user_id,
            scope_id: value.scope_id,
            points: value.points,
            games_played: u32::try_from(value.games_played).unwrap_or_default(),
            games_won: u32::try_from(value.games_won).unwrap_or_default(),
        }
    }
}

/// Filter matching one member of a scope.
pub fn member_filter(scope: &str, user_id: &str) -> Document {
    doc! { "scope_id": scope, "user_id": user_id }
}
