use super::RoundRules;
use crate::state::{
    game::{GuessKind, GuessOutcome, RoundSettlement},
    round::RoundData,
    scoreboard::{ScoreBoard, StreakCounter},
};

const TITLE_CREDIT: f64 = 0.5;
const PRIMARY_ARTIST_CREDIT: f64 = 0.5;
const FEATURED_ARTIST_CREDIT: f64 = 0.25;

/// Title first, then artists; completing both enrolls the participant in the finish order.
pub(super) fn guess(
    round: &mut RoundData,
    participant_count: usize,
    participant: &str,
    raw: &str,
) -> GuessOutcome {
    let kind = if round.process_title_guess(raw, participant) {
        Some(GuessKind::Title)
    } else {
        round
            .process_artist_guess(raw, participant)
            .map(|artist| match round.is_primary(&artist) {
                true => GuessKind::Artist,
                false => GuessKind::FeaturedArtist,
            })
    };

    let Some(kind) = kind else {
        return GuessOutcome::miss();
    };

    let completed = round.has_both(participant) && round.push_double_guesser(participant);
    if !completed {
        return GuessOutcome::hit(kind);
    }

    GuessOutcome {
        completed: true,
        stop_playback: round.double_guessers().len() >= participant_count,
        elapsed_ms: Some(round.elapsed().as_millis() as u64),
        ..GuessOutcome::hit(kind)
    }
}

pub(super) fn settle(
    round: &RoundData,
    rules: &RoundRules<'_>,
    scores: &mut ScoreBoard,
    streaks: &mut StreakCounter,
) -> RoundSettlement {
    let everybody_passed =
        rules.participant_count > 0 && round.passed_count() >= rules.participant_count;
    if everybody_passed {
        return RoundSettlement {
            everybody_passed: true,
            ..RoundSettlement::unsolved()
        };
    }

    for participant in round.title_guessers() {
        scores.inc(participant, TITLE_CREDIT);
    }
    if let Some(guessers) = round.primary_guessers() {
        for participant in guessers {
            scores.inc(participant, PRIMARY_ARTIST_CREDIT);
        }
    }
    for guessers in round.featured_guessers() {
        for participant in guessers {
            scores.inc(participant, FEATURED_ARTIST_CREDIT);
        }
    }
    for (participant, bonus) in round.double_guessers().iter().zip(rules.placement_bonuses) {
        scores.inc(participant, *bonus);
    }
    streaks.inc_streak(round.double_guessers());

    RoundSettlement {
        solved: !round.double_guessers().is_empty(),
        solvers: round.double_guessers().to_vec(),
        ..RoundSettlement::unsolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{matching::FuzzyMatcher, state::game::AcceptedAnswer};

    const BONUSES: [f64; 3] = [1.5, 1.0, 0.5];

    fn round(title: &str, artists: &[&str]) -> RoundData {
        let artists: Vec<String> = artists.iter().map(|a| a.to_string()).collect();
        RoundData::new(title, &artists, FuzzyMatcher::default())
    }

    fn rules(participant_count: usize) -> RoundRules<'static> {
        RoundRules {
            accepted: AcceptedAnswer::Both,
            participant_count,
            placement_bonuses: &BONUSES,
        }
    }

    fn complete(round: &mut RoundData, participant: &str) -> GuessOutcome {
        guess(round, 4, participant, "stay");
        guess(round, 4, participant, "justin bieber")
    }

    #[test]
    fn completing_both_records_finish_order() {
        let mut round = round("Stay", &["Justin Bieber", "The Kid LAROI"]);

        let title = guess(&mut round, 2, "p1", "stay");
        assert_eq!(title.kind, Some(GuessKind::Title));
        assert!(!title.completed);

        let featured = guess(&mut round, 2, "p1", "kid laroi");
        assert_eq!(featured.kind, Some(GuessKind::FeaturedArtist));
        assert!(!featured.completed);

        let primary = guess(&mut round, 2, "p1", "justin bieber");
        assert!(primary.completed);
        assert!(!primary.stop_playback);
        assert_eq!(round.double_guessers(), ["p1".to_string()]);
    }

    #[test]
    fn playback_stops_once_everyone_completed() {
        let mut round = round("Stay", &["Justin Bieber"]);
        guess(&mut round, 2, "p1", "stay");
        guess(&mut round, 2, "p1", "justin bieber");
        guess(&mut round, 2, "p2", "justin bieber");
        let last = guess(&mut round, 2, "p2", "stay");
        assert!(last.completed && last.stop_playback);
    }

    #[test]
    fn settlement_adds_partial_credit_and_placement_bonuses() {
        let mut round = round("Stay", &["Justin Bieber", "The Kid LAROI"]);
        complete(&mut round, "p1");
        complete(&mut round, "p2");
        complete(&mut round, "p3");
        complete(&mut round, "p4");
        guess(&mut round, 4, "p1", "the kid laroi");

        let mut scores = ScoreBoard::new();
        let mut streaks = StreakCounter::new();
        let settlement = settle(&round, &rules(4), &mut scores, &mut streaks);

        assert!(settlement.solved);
        assert_eq!(scores.get("p1"), 0.5 + 0.5 + 0.25 + 1.5);
        assert_eq!(scores.get("p2"), 0.5 + 0.5 + 1.0);
        assert_eq!(scores.get("p3"), 0.5 + 0.5 + 0.5);
        assert_eq!(scores.get("p4"), 1.0);
        assert_eq!(streaks.get("p4"), 1);
    }

    #[test]
    fn everybody_passing_awards_nothing() {
        let mut round = round("Stay", &["Justin Bieber"]);
        guess(&mut round, 2, "p1", "stay");
        round.pass("p1");
        round.pass("p2");

        let mut scores = ScoreBoard::new();
        let mut streaks = StreakCounter::new();
        let settlement = settle(&round, &rules(2), &mut scores, &mut streaks);

        assert!(settlement.everybody_passed);
        assert!(scores.is_empty());
    }

    #[test]
    fn partial_guessers_score_without_streak() {
        let mut round = round("Stay", &["Justin Bieber"]);
        guess(&mut round, 2, "p1", "stay");

        let mut scores = ScoreBoard::new();
        let mut streaks = StreakCounter::new();
        let settlement = settle(&round, &rules(2), &mut scores, &mut streaks);

        assert!(!settlement.solved);
        assert_eq!(scores.get("p1"), 0.5);
        assert_eq!(streaks.get("p1"), 0);
    }
}
