use unicode_normalization::UnicodeNormalization;

use super::FuzzyMatcher;

/// Channel suffixes appended by video platforms to artist names.
const PLATFORM_SUFFIXES: [&str; 2] = ["vevo", " - topic"];

/// Lowercase, strip diacritics and keep only letters and digits.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Normalised form of an artist name, without platform channel suffixes.
pub fn clean_artist(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let stripped = PLATFORM_SUFFIXES
        .iter()
        .find_map(|suffix| lowered.strip_suffix(suffix))
        .map(normalize)
        .filter(|cleaned| !cleaned.is_empty());

    stripped.unwrap_or_else(|| normalize(&lowered))
}

/// Acceptable normalised answers for a track title.
///
/// Candidates are, in order: the title without its leading `artist -` part and
/// trailing `(...)`/`- ...` decorations, then without only the prefix, then
/// without only the suffix, and finally the untouched title. Candidates that
/// collapse to an artist name (as in `Artist - Title` uploads) are dropped so
/// that naming the artist does not count as a title guess.
pub fn title_variants(title: &str, artists: &[String], matcher: &FuzzyMatcher) -> Vec<String> {
    let lowered = title.trim().to_lowercase();
    let without_prefix = strip_prefix_decoration(&lowered);
    let without_suffix = strip_suffix_decoration(&lowered);
    let stripped = strip_suffix_decoration(without_prefix);

    let cleaned_artists: Vec<String> = artists.iter().map(|a| clean_artist(a)).collect();
    let names_artist = |candidate: &str| {
        cleaned_artists
            .iter()
            .any(|artist| matcher.matches(candidate, artist))
    };

    let mut variants: Vec<String> = Vec::with_capacity(4);
    let candidates = [stripped, without_prefix, without_suffix]
        .into_iter()
        .filter(|candidate| *candidate != lowered)
        .chain(std::iter::once(lowered.as_str()));

    for candidate in candidates {
        let normalized = normalize(candidate);
        if normalized.is_empty() || variants.contains(&normalized) || names_artist(&normalized) {
            continue;
        }
        variants.push(normalized);
    }

    if variants.is_empty() {
        // Self-titled tracks: keep the title itself guessable.
        let fallback = normalize(&lowered);
        if !fallback.is_empty() {
            variants.push(fallback);
        }
    }

    variants
}

/// Drop everything from the first `(` or `- ` onwards, with the whitespace before it.
fn strip_suffix_decoration(text: &str) -> &str {
    let cut = [text.find('('), text.find("- ")].into_iter().flatten().min();
    match cut {
        Some(index) => text[..index].trim_end(),
        None => text,
    }
}

/// Drop everything up to the last ` -` and the whitespace after it.
fn strip_prefix_decoration(text: &str) -> &str {
    match text.rfind(" -") {
        Some(index) => text[index + 2..].trim_start(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artists(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("Café del Mar!"), "cafedelmar");
        assert_eq!(normalize("  Don't Stop Me Now "), "dontstopmenow");
        assert_eq!(normalize("99 Luftballons"), "99luftballons");
    }

    #[test]
    fn clean_artist_drops_channel_suffixes() {
        assert_eq!(clean_artist("TaylorSwiftVEVO"), "taylorswift");
        assert_eq!(clean_artist("Daft Punk - Topic"), "daftpunk");
        assert_eq!(clean_artist("Beyoncé"), "beyonce");
        assert_eq!(clean_artist("Vevo"), "vevo");
    }

    #[test]
    fn decorated_title_keeps_plain_and_original_forms() {
        let variants = title_variants(
            "Blank Space (Lyric Video)",
            &artists(&["Taylor Swift"]),
            &FuzzyMatcher::default(),
        );

        assert_eq!(variants, vec!["blankspace", "blankspacelyricvideo"]);
    }

    #[test]
    fn artist_prefixed_upload_does_not_accept_the_artist_as_title() {
        let variants = title_variants(
            "Ed Sheeran - Shape of You (Official Video)",
            &artists(&["Ed Sheeran"]),
            &FuzzyMatcher::default(),
        );

        assert_eq!(variants, vec!["shapeofyou", "shapeofyouofficialvideo"]);
        assert!(!variants.contains(&"edsheeran".to_string()));
    }

    #[test]
    fn undecorated_title_yields_single_variant() {
        let variants = title_variants(
            "Bohemian Rhapsody",
            &artists(&["Queen"]),
            &FuzzyMatcher::default(),
        );
        assert_eq!(variants, vec!["bohemianrhapsody"]);
    }

    #[test]
    fn self_titled_track_stays_guessable() {
        let variants = title_variants("Weezer", &artists(&["Weezer"]), &FuzzyMatcher::default());
        assert_eq!(variants, vec!["weezer"]);
    }

    #[test]
    fn decoration_helpers_follow_first_suffix_and_last_prefix() {
        assert_eq!(strip_suffix_decoration("song - live (remix)"), "song");
        assert_eq!(strip_suffix_decoration("song (live) - remix"), "song");
        assert_eq!(strip_prefix_decoration("a - b - song"), "song");
        assert_eq!(strip_prefix_decoration("plain"), "plain");
    }
}
