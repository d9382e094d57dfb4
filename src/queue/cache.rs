use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::audio::PlayableTrack;

#[derive(Debug, Clone)]
struct CachedTrack {
    track: PlayableTrack,
    stored_at: Instant,
}

/// Process-wide cache of resolved descriptors, keyed by their `title - artist` display string.
#[derive(Debug)]
pub struct ResolutionCache {
    entries: DashMap<String, CachedTrack>,
    ttl: Duration,
}

impl ResolutionCache {
    /// Empty cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cache key for a display string.
    pub fn key(display: &str) -> String {
        display
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Fresh entry for `display`, if any. Expired entries are evicted on the way.
    pub fn get(&self, display: &str) -> Option<PlayableTrack> {
        let key = Self::key(display);
        {
            let entry = self.entries.get(&key)?;
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.track.clone());
            }
        }
        self.entries
            .remove_if(&key, |_, cached| cached.stored_at.elapsed() >= self.ttl);
        None
    }

    /// Store (or refresh) the resolution of `display`.
    pub fn insert(&self, display: &str, track: PlayableTrack) {
        self.entries.insert(
            Self::key(display),
            CachedTrack {
                track,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, cached| cached.stored_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::track_info;

    fn track(encoded: &str) -> PlayableTrack {
        PlayableTrack {
            encoded: encoded.into(),
            info: track_info("Shape of You", &["Ed Sheeran"], 200_000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        cache.insert("Shape of You - Ed Sheeran", track("a"));

        assert!(cache.get("shape of you -  ed sheeran").is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get("Shape of You - Ed Sheeran").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        cache.insert("old - artist", track("old"));
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert("new - artist", track("new"));
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new - artist").is_some());
    }
}
