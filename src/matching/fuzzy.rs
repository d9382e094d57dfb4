use strsim::jaro_winkler;

/// Similarity judge: two normalised strings match when they are equal or close enough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl FuzzyMatcher {
    /// Threshold used when nothing else is configured.
    pub const DEFAULT_THRESHOLD: f64 = 0.75;

    /// Build a matcher accepting anything at or above `threshold`.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Jaro-Winkler similarity in `[0, 1]`.
    pub fn similarity(&self, left: &str, right: &str) -> f64 {
        jaro_winkler(left, right)
    }

    /// Both inputs are expected to be normalised already. Empty strings never match.
    pub fn matches(&self, left: &str, right: &str) -> bool {
        if left.is_empty() || right.is_empty() {
            return false;
        }
        left == right || self.similarity(left, right) >= self.threshold
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}
