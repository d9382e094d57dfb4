use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;

use super::MemberStore;
use crate::dao::{models::MemberEntity, storage::StorageResult};

/// Process-local member store used when no database is configured.
#[derive(Debug, Default)]
pub struct InMemoryMemberStore {
    records: DashMap<(String, String), MemberEntity>,
    pending: Mutex<Vec<MemberEntity>>,
    flushes: AtomicUsize,
}

impl InMemoryMemberStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Durable record of a member, if any.
    pub fn get(&self, scope: &str, user_id: &str) -> Option<MemberEntity> {
        self.records
            .get(&(scope.to_owned(), user_id.to_owned()))
            .map(|entry| entry.value().clone())
    }

    /// Number of flushes performed.
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    fn find(&self, scope: &str, ids: &[String]) -> Vec<MemberEntity> {
        ids.iter().filter_map(|id| self.get(scope, id)).collect()
    }

    fn queue(&self, member: MemberEntity) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(member);
    }

    fn write_pending(&self) {
        let pending = {
            let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for member in pending {
            self.records
                .insert((member.scope_id.clone(), member.user_id.clone()), member);
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

impl MemberStore for InMemoryMemberStore {
    fn find_members(
        &self,
        scope: String,
        ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<MemberEntity>>> {
        let found = self.find(&scope, &ids);
        Box::pin(async move { Ok(found) })
    }

    fn upsert(&self, member: MemberEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.queue(member);
        Box::pin(async { Ok(()) })
    }

    fn flush(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.write_pending();
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
