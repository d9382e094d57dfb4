use tracing::info;

use crate::{
    dao::member_store::with_store_context,
    dto::sse::MemberProgress,
    error::ServiceError,
    state::{SharedState, game::Award},
};

/// Add the points earned in a game to every participant's long-term record.
///
/// Every participant gets a game played; the winner also gets a game won.
pub async fn record_awards(
    state: &SharedState,
    scope: &str,
    awards: Vec<Award>,
) -> Result<Vec<MemberProgress>, ServiceError> {
    let store = state.require_member_store().await?;
    let count = awards.len();

    let progress = with_store_context(store, scope, move |ctx| async move {
        let ids: Vec<String> = awards
            .iter()
            .map(|award| award.participant.clone())
            .collect();
        ctx.preload(&ids).await?;

        let mut progress = Vec::with_capacity(awards.len());
        for award in awards {
            let entry = ctx
                .update(&award.participant, |member| {
                    let level_before = member.level();
                    let rank_before = member.rank();

                    member.points += award.points;
                    member.games_played += 1;
                    if award.winner {
                        member.games_won += 1;
                    }

                    MemberProgress {
                        participant: member.user_id.clone(),
                        score: award.score,
                        points_earned: award.points,
                        points: member.points,
                        level: member.level(),
                        level_up: member.level() > level_before,
                        rank: member.rank(),
                        rank_up: member.rank() > rank_before,
                        winner: award.winner,
                    }
                })
                .await?;
            progress.push(entry);
        }
        Ok(progress)
    })
    .await?;

    info!(scope, members = count, "recorded game awards");
    Ok(progress)
}
