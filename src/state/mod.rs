/// Game session and participants.
pub mod game;
/// Standard and competitive rules.
pub mod modes;
/// Running sessions by room.
pub mod registry;
/// Per-track round bookkeeping.
pub mod round;
/// Scores and streaks.
pub mod scoreboard;
/// Arrival-order gate for session access.
pub mod serializer;
mod sse;
/// Session lifecycle transitions.
pub mod state_machine;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    audio::AudioPlayer,
    config::AppConfig,
    dao::member_store::MemberStore,
    error::ServiceError,
    matching::FuzzyMatcher,
    queue::{QueueOptions, ResolutionCache},
};

pub use self::registry::{SessionHandle, SessionRegistry};
pub use self::sse::SseHub;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Central application state: configuration, running sessions and collaborators.
pub struct AppState {
    config: Arc<AppConfig>,
    registry: SessionRegistry,
    cache: Arc<ResolutionCache>,
    player: Arc<dyn AudioPlayer>,
    member_store: RwLock<Option<Arc<dyn MemberStore>>>,
    degraded: watch::Sender<bool>,
    sse: SseHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a member store is installed.
    pub fn new(config: AppConfig, player: Arc<dyn AudioPlayer>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            cache: Arc::new(ResolutionCache::new(config.resolution_cache_ttl())),
            config: Arc::new(config),
            registry: SessionRegistry::new(),
            player,
            member_store: RwLock::new(None),
            degraded: degraded_tx,
            sse: SseHub::new(SSE_CAPACITY),
        })
    }

    /// Application tunables.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Sessions currently running.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Process-wide track resolution cache.
    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Audio player shared by every session.
    pub fn player(&self) -> Arc<dyn AudioPlayer> {
        self.player.clone()
    }

    /// Broadcast hub used for the SSE streams.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Options handed to every new track queue.
    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            window: self.config.round_window(),
            timeout: self.config.external_timeout(),
            matcher: FuzzyMatcher::new(self.config.guess_threshold()),
        }
    }

    /// Obtain a handle to the current member store, if one is installed.
    pub async fn member_store(&self) -> Option<Arc<dyn MemberStore>> {
        let guard = self.member_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current member store or an unavailable error.
    pub async fn require_member_store(&self) -> Result<Arc<dyn MemberStore>, ServiceError> {
        self.member_store().await.ok_or_else(|| {
            ServiceError::InvalidState("member store unavailable (degraded mode)".into())
        })
    }

    /// Install a member store implementation and leave degraded mode.
    pub async fn set_member_store(&self, store: Arc<dyn MemberStore>) {
        {
            let mut guard = self.member_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
