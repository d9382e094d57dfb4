use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};

use super::game::ParticipantId;
use crate::matching::{FuzzyMatcher, clean_artist, normalize, title_variants};

/// Answers and guess bookkeeping for the track currently playing.
#[derive(Debug, Clone)]
pub struct RoundData {
    title: String,
    title_variants: Vec<String>,
    artists: IndexMap<String, IndexSet<ParticipantId>>,
    title_guessers: IndexSet<ParticipantId>,
    passed: IndexSet<ParticipantId>,
    double_guessers: Vec<ParticipantId>,
    matcher: FuzzyMatcher,
    started_at: Instant,
}

impl RoundData {
    /// Prepare a round for a track; the first artist is the primary one.
    pub fn new(title: &str, artists: &[String], matcher: FuzzyMatcher) -> Self {
        let mut artist_guessers = IndexMap::with_capacity(artists.len());
        for artist in artists {
            let cleaned = clean_artist(artist);
            if !cleaned.is_empty() {
                artist_guessers.entry(cleaned).or_insert_with(IndexSet::new);
            }
        }

        Self {
            title: title.to_owned(),
            title_variants: title_variants(title, artists, &matcher),
            artists: artist_guessers,
            title_guessers: IndexSet::new(),
            passed: IndexSet::new(),
            double_guessers: Vec::new(),
            matcher,
            started_at: Instant::now(),
        }
    }

    /// Display title of the track.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Record a correct title guess.
    ///
    /// Returns false without looking at the guess when the participant already found the title.
    pub fn process_title_guess(&mut self, guess: &str, participant: &str) -> bool {
        if self.title_guessers.contains(participant) {
            return false;
        }
        let guess = normalize(guess);
        let matched = self
            .title_variants
            .iter()
            .any(|variant| self.matcher.matches(&guess, variant));
        if matched {
            self.title_guessers.insert(participant.to_owned());
        }
        matched
    }

    /// Record a correct artist guess and return the matched (cleaned) artist.
    ///
    /// Artists are tried in track order; ones this participant already found are skipped.
    pub fn process_artist_guess(&mut self, guess: &str, participant: &str) -> Option<String> {
        let guess = normalize(guess);
        let matcher = self.matcher;
        let (artist, guessers) = self.artists.iter_mut().find(|(artist, guessers)| {
            !guessers.contains(participant) && matcher.matches(&guess, artist)
        })?;
        guessers.insert(participant.to_owned());
        Some(artist.clone())
    }

    /// Cleaned name of the headline artist.
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.keys().next().map(String::as_str)
    }

    /// Whether `artist` (as returned by [`Self::process_artist_guess`]) is the headline one.
    pub fn is_primary(&self, artist: &str) -> bool {
        self.primary_artist() == Some(artist)
    }

    /// Participants who found the title, in order.
    pub fn title_guessers(&self) -> &IndexSet<ParticipantId> {
        &self.title_guessers
    }

    /// Participants who found the headline artist, in order.
    pub fn primary_guessers(&self) -> Option<&IndexSet<ParticipantId>> {
        self.artists.values().next()
    }

    /// Guessers of every non-headline artist.
    pub fn featured_guessers(&self) -> impl Iterator<Item = &IndexSet<ParticipantId>> {
        self.artists.values().skip(1)
    }

    /// Whether the participant found both the title and the headline artist.
    pub fn has_both(&self, participant: &str) -> bool {
        self.title_guessers.contains(participant)
            && self
                .primary_guessers()
                .is_some_and(|guessers| guessers.contains(participant))
    }

    /// Whether anybody found the title.
    pub fn title_found(&self) -> bool {
        !self.title_guessers.is_empty()
    }

    /// Whether anybody found the headline artist.
    pub fn primary_found(&self) -> bool {
        self.primary_guessers()
            .is_some_and(|guessers| !guessers.is_empty())
    }

    /// Mark a participant as giving up on this round. False when already passed.
    pub fn pass(&mut self, participant: &str) -> bool {
        self.passed.insert(participant.to_owned())
    }

    /// Whether the participant passed.
    pub fn has_passed(&self, participant: &str) -> bool {
        self.passed.contains(participant)
    }

    /// Number of participants who passed.
    pub fn passed_count(&self) -> usize {
        self.passed.len()
    }

    /// Append a participant to the completion order; ignored when already present.
    pub fn push_double_guesser(&mut self, participant: &str) -> bool {
        if self.double_guessers.iter().any(|id| id == participant) {
            return false;
        }
        self.double_guessers.push(participant.to_owned());
        true
    }

    /// Participants who found both answers, in completion order.
    pub fn double_guessers(&self) -> &[ParticipantId] {
        &self.double_guessers
    }

    /// Time since the round opened.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(title: &str, artists: &[&str]) -> RoundData {
        let artists: Vec<String> = artists.iter().map(|a| a.to_string()).collect();
        RoundData::new(title, &artists, FuzzyMatcher::default())
    }

    #[test]
    fn title_guess_is_idempotent_for_guessers() {
        let mut round = round("Blank Space (Lyric Video)", &["Taylor Swift"]);
        assert!(round.process_title_guess("blank space", "p1"));
        assert!(!round.process_title_guess("Blank Space", "p1"));
        assert!(!round.process_title_guess("anything else", "p1"));
        assert_eq!(round.title_guessers().len(), 1);
    }

    #[test]
    fn wrong_title_is_not_recorded() {
        let mut round = round("Shape of You", &["Ed Sheeran"]);
        assert!(!round.process_title_guess("perfect", "p1"));
        assert!(!round.title_found());
    }

    #[test]
    fn artist_guess_reports_primary_and_featured() {
        let mut round = round("Stay", &["Justin Bieber", "The Kid LAROI"]);

        let featured = round.process_artist_guess("kid laroi", "p1");
        assert_eq!(featured.as_deref(), Some("thekidlaroi"));
        assert!(!round.is_primary("thekidlaroi"));

        let primary = round.process_artist_guess("justin bieber", "p1");
        assert_eq!(primary.as_deref(), Some("justinbieber"));
        assert!(round.is_primary("justinbieber"));
        assert!(round.primary_found());
    }

    #[test]
    fn artist_already_found_by_participant_is_skipped() {
        let mut round = round("Song", &["Daft Punk"]);
        assert!(round.process_artist_guess("daft punk", "p1").is_some());
        assert!(round.process_artist_guess("daft punk", "p1").is_none());
        assert!(round.process_artist_guess("daft punk", "p2").is_some());
    }

    #[test]
    fn pass_and_double_guessers_are_unique() {
        let mut round = round("Song", &["Artist"]);
        assert!(round.pass("p1"));
        assert!(!round.pass("p1"));
        assert!(round.push_double_guesser("p2"));
        assert!(!round.push_double_guesser("p2"));
        assert_eq!(round.double_guessers(), ["p2".to_string()]);
    }
}
