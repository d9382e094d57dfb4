mod context;
/// Process-local member store.
pub mod memory;
/// MongoDB member store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

pub use self::context::{StoreContext, with_store_context};

use futures::future::BoxFuture;

use crate::dao::{models::MemberEntity, storage::StorageResult};

/// Abstraction over the persistence layer for member statistics.
///
/// Writes are buffered by [`MemberStore::upsert`] and only become durable on [`MemberStore::flush`].
pub trait MemberStore: Send + Sync {
    /// Records of `ids` within `scope`; unknown members are simply absent.
    fn find_members(
        &self,
        scope: String,
        ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<MemberEntity>>>;
    /// Queue a record for writing.
    fn upsert(&self, member: MemberEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Write every queued record.
    fn flush(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
