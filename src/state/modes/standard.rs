use crate::state::{
    game::{AcceptedAnswer, GuessKind, GuessOutcome, ParticipantId, RoundSettlement},
    round::RoundData,
    scoreboard::{ScoreBoard, StreakCounter},
};

pub(super) fn guess(
    round: &mut RoundData,
    accepted: AcceptedAnswer,
    participant: &str,
    raw: &str,
) -> GuessOutcome {
    let nothing_found_before = !round.title_found() && !round.primary_found();

    let kind = match accepted {
        AcceptedAnswer::Title => title(round, participant, raw),
        AcceptedAnswer::Artist => artist(round, participant, raw),
        AcceptedAnswer::Both if round.title_found() => artist(round, participant, raw),
        AcceptedAnswer::Both if round.primary_found() => title(round, participant, raw),
        AcceptedAnswer::Either | AcceptedAnswer::Both => {
            artist(round, participant, raw).or_else(|| title(round, participant, raw))
        }
    };

    match kind {
        None => GuessOutcome::miss(),
        Some(GuessKind::FeaturedArtist) => GuessOutcome::hit(GuessKind::FeaturedArtist),
        Some(kind) => {
            let halfway = accepted == AcceptedAnswer::Both && nothing_found_before;
            GuessOutcome {
                halfway,
                completed: !halfway,
                stop_playback: !halfway,
                elapsed_ms: Some(round.elapsed().as_millis() as u64),
                ..GuessOutcome::hit(kind)
            }
        }
    }
}

fn title(round: &mut RoundData, participant: &str, raw: &str) -> Option<GuessKind> {
    round
        .process_title_guess(raw, participant)
        .then_some(GuessKind::Title)
}

fn artist(round: &mut RoundData, participant: &str, raw: &str) -> Option<GuessKind> {
    let matched = round.process_artist_guess(raw, participant)?;
    if round.is_primary(&matched) {
        Some(GuessKind::Artist)
    } else {
        Some(GuessKind::FeaturedArtist)
    }
}

pub(super) fn settle(
    round: &RoundData,
    accepted: AcceptedAnswer,
    scores: &mut ScoreBoard,
    streaks: &mut StreakCounter,
) -> RoundSettlement {
    let mut solvers: Vec<ParticipantId> = round.title_guessers().iter().cloned().collect();
    if let Some(artist_guessers) = round.primary_guessers() {
        for participant in artist_guessers {
            if !solvers.contains(participant) {
                solvers.push(participant.clone());
            }
        }
    }

    let solved = match accepted {
        AcceptedAnswer::Both => {
            round.title_found() && round.primary_found() && matches!(solvers.len(), 1 | 2)
        }
        _ => !solvers.is_empty(),
    };

    if !solved {
        streaks.reset_all();
        let partial = match (round.title_found(), round.primary_found()) {
            (true, _) => Some(GuessKind::Title),
            (false, true) => Some(GuessKind::Artist),
            (false, false) => None,
        };
        return RoundSettlement {
            partial,
            ..RoundSettlement::unsolved()
        };
    }

    let share = 1.0 / solvers.len() as f64;
    for participant in &solvers {
        scores.inc(participant, share);
    }
    streaks.inc_streak(&solvers);

    RoundSettlement {
        solved: true,
        solvers,
        ..RoundSettlement::unsolved()
    }
}
