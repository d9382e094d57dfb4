//! Text normalisation and fuzzy comparison used to judge guesses.

/// Jaro-Winkler threshold matcher.
pub mod fuzzy;
/// Guess and answer normalisation.
pub mod normalizer;

pub use fuzzy::FuzzyMatcher;
pub use normalizer::{clean_artist, normalize, title_variants};
