//! Application-level configuration loading, including the scoring and matching tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "NEON_BEAT_TRIVIA_CONFIG_PATH";

const DEFAULT_GUESS_THRESHOLD: f64 = 0.75;
const DEFAULT_PLACEMENT_BONUSES: [f64; 3] = [1.5, 1.0, 0.5];
const DEFAULT_ROUND_WINDOW_SECS: u64 = 30;
const DEFAULT_RESOLUTION_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_EXTERNAL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_JOIN_WINDOW_MS: u64 = 10_000;
const DEFAULT_MIN_GOAL: u32 = 5;
const DEFAULT_STALLED_NOTICE_MIN_MS: u64 = 1_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    guess_threshold: f64,
    placement_bonuses: Vec<f64>,
    round_window: Duration,
    resolution_cache_ttl: Duration,
    external_timeout: Duration,
    join_window: Duration,
    min_goal: u32,
    stalled_notice_min: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        threshold = app_config.guess_threshold,
                        "loaded game settings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Minimum Jaro-Winkler similarity for a guess to be accepted.
    pub fn guess_threshold(&self) -> f64 {
        self.guess_threshold
    }

    /// Bonus points for the first, second, third... participants completing a competitive round.
    pub fn placement_bonuses(&self) -> &[f64] {
        &self.placement_bonuses
    }

    /// Length of the audio excerpt played for each round.
    pub fn round_window(&self) -> Duration {
        self.round_window
    }

    /// How long a resolved track stays in the shared resolution cache.
    pub fn resolution_cache_ttl(&self) -> Duration {
        self.resolution_cache_ttl
    }

    /// Upper bound for any single call to the audio collaborator.
    pub fn external_timeout(&self) -> Duration {
        self.external_timeout
    }

    /// Opt-in period granted to competitive participants before the first track.
    pub fn join_window(&self) -> Duration {
        self.join_window
    }

    /// Smallest point goal a host may request.
    pub fn min_goal(&self) -> u32 {
        self.min_goal
    }

    /// Stalls shorter than this are not worth a notice.
    pub fn stalled_notice_min(&self) -> Duration {
        self.stalled_notice_min
    }

    /// Override the competitive join window (used by tests and single-player setups).
    pub fn with_join_window(mut self, join_window: Duration) -> Self {
        self.join_window = join_window;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            guess_threshold: DEFAULT_GUESS_THRESHOLD,
            placement_bonuses: DEFAULT_PLACEMENT_BONUSES.to_vec(),
            round_window: Duration::from_secs(DEFAULT_ROUND_WINDOW_SECS),
            resolution_cache_ttl: Duration::from_secs(DEFAULT_RESOLUTION_CACHE_TTL_SECS),
            external_timeout: Duration::from_millis(DEFAULT_EXTERNAL_TIMEOUT_MS),
            join_window: Duration::from_millis(DEFAULT_JOIN_WINDOW_MS),
            min_goal: DEFAULT_MIN_GOAL,
            stalled_notice_min: Duration::from_millis(DEFAULT_STALLED_NOTICE_MIN_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    guess_threshold: Option<f64>,
    placement_bonuses: Option<Vec<f64>>,
    round_window_secs: Option<u64>,
    resolution_cache_ttl_secs: Option<u64>,
    external_timeout_ms: Option<u64>,
    join_window_ms: Option<u64>,
    min_goal: Option<u32>,
    stalled_notice_min_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();

        let guess_threshold = match value.guess_threshold {
            Some(threshold) if threshold > 0.0 && threshold <= 1.0 => threshold,
            Some(threshold) => {
                warn!(threshold, "guess threshold must be within (0, 1]; keeping default");
                defaults.guess_threshold
            }
            None => defaults.guess_threshold,
        };

        let placement_bonuses = match value.placement_bonuses {
            Some(bonuses) if !bonuses.is_empty() && bonuses.iter().all(|b| *b >= 0.0) => bonuses,
            Some(_) => {
                warn!("placement bonuses must be a non-empty list of positive values; keeping default");
                defaults.placement_bonuses
            }
            None => defaults.placement_bonuses,
        };

        let round_window = match value.round_window_secs {
            Some(0) => {
                warn!("round window must be strictly positive; keeping default");
                defaults.round_window
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.round_window,
        };

        Self {
            guess_threshold,
            placement_bonuses,
            round_window,
            resolution_cache_ttl: value
                .resolution_cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.resolution_cache_ttl),
            external_timeout: value
                .external_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.external_timeout),
            join_window: value
                .join_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.join_window),
            min_goal: value.min_goal.unwrap_or(defaults.min_goal),
            stalled_notice_min: value
                .stalled_notice_min_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.stalled_notice_min),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
