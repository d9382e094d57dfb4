use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::open_member_database,
    error::{MongoDaoError, MongoResult},
    models::{MongoMemberDocument, member_filter},
};
use crate::dao::{member_store::MemberStore, models::MemberEntity, storage::StorageResult};

const MEMBER_COLLECTION_NAME: &str = "members";

/// Member store backed by MongoDB; upserts are buffered until the next flush.
#[derive(Clone)]
pub struct MongoMemberStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    pending: Mutex<Vec<MemberEntity>>,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            open_member_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMemberStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            open_member_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
            pending: Mutex::new(Vec::new()),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"scope_id": 1, "user_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("member_scope_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MEMBER_COLLECTION_NAME,
                index: "scope_id,user_id",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoMemberDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMemberDocument>(MEMBER_COLLECTION_NAME)
    }

    async fn find_members(&self, scope: String, ids: Vec<String>) -> MongoResult<Vec<MemberEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoMemberDocument> = collection
            .find(doc! { "scope_id": scope.as_str(), "user_id": { "$in": ids } })
            .await
            .map_err(|source| MongoDaoError::LoadMembers {
                scope: scope.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadMembers {
                scope: scope.clone(),
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn flush(&self) -> MongoResult<()> {
        let mut pending = self.inner.pending.lock().await;
        if pending.is_empty() {
            return Ok(());
        }

        let collection = self.collection().await;
        while let Some(member) = pending.first().cloned() {
            let filter = member_filter(&member.scope_id, &member.user_id);
            let scope = member.scope_id.clone();
            let user_id = member.user_id.clone();
            let document: MongoMemberDocument = member.into();

            collection
                .replace_one(filter, &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::SaveMember {
                    scope,
                    user_id,
                    source,
                })?;
            pending.remove(0);
        }

        debug!("flushed member records");
        Ok(())
    }
}

impl MemberStore for MongoMemberStore {
    fn find_members(
        &self,
        scope: String,
        ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<MemberEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_members(scope, ids).await.map_err(Into::into) })
    }

    fn upsert(&self, member: MemberEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.pending.lock().await.push(member);
            Ok(())
        })
    }

    fn flush(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.flush().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
