use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use super::{
    game::{GameSession, RoomId},
    modes::GameMode,
    serializer::{GuessSerializer, SerialGuard},
};
use crate::error::ServiceError;

/// A live session and the gate serialising every mutation of it.
pub struct SessionHandle {
    id: Uuid,
    room: RoomId,
    mode: GameMode,
    core: GuessSerializer<GameSession>,
}

impl SessionHandle {
    /// Wrap a freshly created session.
    pub fn new(session: GameSession) -> Self {
        Self {
            id: session.id,
            room: session.room.clone(),
            mode: session.mode(),
            core: GuessSerializer::new(session),
        }
    }

    /// Identifier of the session run.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Hosting room.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Game flavour, readable without taking a turn.
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Wait for exclusive access, in call order.
    pub fn lock(&self) -> impl Future<Output = SerialGuard<'_, GameSession>> + '_ {
        self.core.acquire()
    }
}

/// Sessions currently running, at most one per room.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<RoomId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; fails when the room already runs one.
    pub fn insert(&self, handle: Arc<SessionHandle>) -> Result<(), ServiceError> {
        match self.sessions.entry(handle.room.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "a game is already running in room {}",
                handle.room
            ))),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Live session of a room.
    pub fn get(&self, room: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(room).map(|entry| entry.value().clone())
    }

    /// Remove the session `id` from its room. Returns false when it was already gone.
    pub fn remove(&self, room: &str, id: Uuid) -> bool {
        self.sessions
            .remove_if(room, |_, handle| handle.id == id)
            .is_some()
    }

    /// Number of running sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is running.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        audio::fake::FakePlayer,
        matching::FuzzyMatcher,
        queue::{QueueOptions, ResolutionCache, TrackQueue},
        state::game::{AcceptedAnswer, GameSettings},
    };

    fn handle(room: &str) -> Arc<SessionHandle> {
        let queue = TrackQueue::new(
            room,
            Vec::new(),
            Arc::new(FakePlayer::new()),
            Arc::new(ResolutionCache::new(Duration::from_secs(60))),
            QueueOptions {
                window: Duration::from_secs(30),
                timeout: Duration::from_secs(1),
                matcher: FuzzyMatcher::default(),
            },
        );
        let settings = GameSettings {
            host: "host".into(),
            mode: GameMode::Standard,
            accepted_answer: AcceptedAnswer::Either,
            goal: None,
            limit: None,
            playlist_name: "mix".into(),
            placement_bonuses: Vec::new(),
        };
        Arc::new(SessionHandle::new(GameSession::new(room, settings, queue)))
    }

    #[test]
    fn one_session_per_room() {
        let registry = SessionRegistry::new();
        registry.insert(handle("room")).unwrap();

        let err = registry.insert(handle("room")).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        registry.insert(handle("other")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_only_matches_same_run() {
        let registry = SessionRegistry::new();
        let first = handle("room");
        registry.insert(first.clone()).unwrap();

        assert!(!registry.remove("room", Uuid::new_v4()));
        assert!(registry.remove("room", first.id()));
        assert!(!registry.remove("room", first.id()));
        assert!(registry.get("room").is_none());
    }
}
