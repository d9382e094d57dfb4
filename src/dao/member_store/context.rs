use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use super::MemberStore;
use crate::dao::{
    models::MemberEntity,
    storage::{StorageError, StorageResult},
};

/// Unit of work over a [`MemberStore`]: each member is loaded at most once and
/// every touched record is written back when the context closes.
#[derive(Clone)]
pub struct StoreContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    store: Arc<dyn MemberStore>,
    scope: String,
    work: Mutex<UnitOfWork>,
}

#[derive(Default)]
struct UnitOfWork {
    members: IndexMap<String, MemberEntity>,
    dirty: IndexSet<String>,
}

impl StoreContext {
    fn new(store: Arc<dyn MemberStore>, scope: String) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                store,
                scope,
                work: Mutex::new(UnitOfWork::default()),
            }),
        }
    }

    /// Scope every record of this context belongs to.
    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    fn with_work<R>(&self, f: impl FnOnce(&mut UnitOfWork) -> R) -> R {
        let mut work = self.inner.work.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut work)
    }

    /// Load the given members in one round trip; already loaded ones are skipped.
    pub async fn preload(&self, ids: &[String]) -> StorageResult<()> {
        let missing: Vec<String> = self.with_work(|work| {
            ids.iter()
                .filter(|id| !work.members.contains_key(*id))
                .cloned()
                .collect()
        });
        if missing.is_empty() {
            return Ok(());
        }

        let found = self
            .inner
            .store
            .find_members(self.inner.scope.clone(), missing)
            .await?;
        self.with_work(|work| {
            for member in found {
                work.members.entry(member.user_id.clone()).or_insert(member);
            }
        });
        Ok(())
    }

    /// Mutate a member record and mark it for writing.
    pub async fn update<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut MemberEntity) -> R,
    ) -> StorageResult<R> {
        self.ensure_loaded(user_id).await?;
        let scope = self.inner.scope.clone();
        Ok(self.with_work(|work| {
            work.dirty.insert(user_id.to_owned());
            let member = work
                .members
                .entry(user_id.to_owned())
                .or_insert_with(|| MemberEntity::new(user_id, scope));
            f(member)
        }))
    }

    async fn ensure_loaded(&self, user_id: &str) -> StorageResult<()> {
        if self.with_work(|work| work.members.contains_key(user_id)) {
            return Ok(());
        }
        self.preload(&[user_id.to_owned()]).await
    }

    /// Write every dirty record and flush the store.
    async fn close(&self) -> StorageResult<()> {
        let dirty: Vec<MemberEntity> = self.with_work(|work| {
            let dirty = std::mem::take(&mut work.dirty);
            dirty
                .iter()
                .filter_map(|id| work.members.get(id).cloned())
                .collect()
        });

        for member in dirty {
            self.inner.store.upsert(member).await?;
        }
        self.inner.store.flush().await
    }
}

/// Run `work` inside a fresh [`StoreContext`] and close it on every exit path.
///
/// The work and the close run on their own task, so dropping the returned future
/// does not prevent the touched records from being written.
pub async fn with_store_context<F, Fut, T>(
    store: Arc<dyn MemberStore>,
    scope: impl Into<String>,
    work: F,
) -> StorageResult<T>
where
    F: FnOnce(StoreContext) -> Fut + Send + 'static,
    Fut: Future<Output = StorageResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let context = StoreContext::new(store, scope.into());

    let task = tokio::spawn(async move {
        let outcome = work(context.clone()).await;
        let closed = context.close().await;
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(scope = %context.scope(), error = %close_err, "failed to close store context after work error");
                Err(err)
            }
        }
    });

    task.await
        .map_err(|err| StorageError::interrupted(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::member_store::memory::InMemoryMemberStore;

    #[tokio::test]
    async fn touched_members_are_written_on_close() {
        let store = Arc::new(InMemoryMemberStore::new());

        let level = with_store_context(store.clone(), "room", |ctx| async move {
            ctx.update("u1", |member| member.points += 1_000).await?;
            ctx.update("u1", |member| {
                member.points += 1_500;
                member.level()
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(level, 10);
        assert_eq!(store.get("room", "u1").map(|m| m.points), Some(2_500));
        assert_eq!(store.flushes(), 1);
    }

    #[tokio::test]
    async fn existing_records_are_loaded_once_and_mutated() {
        let store = Arc::new(InMemoryMemberStore::new());
        let mut existing = MemberEntity::new("u1", "room");
        existing.games_played = 4;
        store.upsert(existing).await.unwrap();
        store.flush().await.unwrap();

        with_store_context(store.clone(), "room", |ctx| async move {
            ctx.preload(&["u1".to_string(), "u2".to_string()]).await?;
            ctx.update("u1", |member| member.games_played += 1).await?;
            ctx.update("u1", |member| member.games_played += 1).await?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(store.get("room", "u1").map(|m| m.games_played), Some(6));
        assert!(store.get("room", "u2").is_none());
    }

    #[tokio::test]
    async fn work_error_still_closes_context() {
        let store = Arc::new(InMemoryMemberStore::new());

        let result: StorageResult<()> = with_store_context(store.clone(), "room", |ctx| async move {
            ctx.update("u1", |member| member.games_won += 1).await?;
            Err(StorageError::interrupted("boom"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(store.get("room", "u1").map(|m| m.games_won), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_caller_does_not_skip_close() {
        let store = Arc::new(InMemoryMemberStore::new());

        let call = with_store_context(store.clone(), "room", |ctx| async move {
            ctx.update("u1", |member| member.points += 1).await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });
        assert!(tokio::time::timeout(Duration::from_secs(1), call).await.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.get("room", "u1").map(|m| m.points), Some(1));
    }
}
