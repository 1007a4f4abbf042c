use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Collection, Database, bson::doc};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, doc_id, is_duplicate_key},
};
use crate::{
    dao::{
        game_store::GameStore,
        storage::{StorageError, StorageResult},
    },
    state::game::{Game, GameId},
};

const GAME_COLLECTION_NAME: &str = "games";

#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
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
        let database = self.config.open().await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB.
    ///
    /// Games are keyed by `_id`, so no extra index is needed for lookups or
    /// duplicate detection.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = config.open().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn insert(&self, game: Game) -> StorageResult<()> {
        let id = game.id.clone();
        let collection = self.collection().await;

        match collection.insert_one(MongoGameDocument::from(game)).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::already_exists(id)),
            Err(source) => Err(MongoDaoError::SaveGame {
                id: id.to_string(),
                source,
            }
            .into()),
        }
    }

    /// Upsert a game document, replacing any previous state with the provided payload.
    async fn save(&self, game: Game) -> MongoResult<()> {
        let id = game.id.clone();
        let collection = self.collection().await;

        collection
            .replace_one(doc_id(&id), MongoGameDocument::from(game))
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame {
                id: id.to_string(),
                source,
            })?;

        Ok(())
    }

    async fn find(&self, id: GameId) -> MongoResult<Option<Game>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadGame {
                id: id.to_string(),
                source,
            })?;

        Ok(document.map(Into::into))
    }
}

impl GameStore for MongoGameStore {
    fn insert_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert(game).await })
    }

    fn save_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(game).await.map_err(StorageError::from) })
    }

    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<Game>>> {
        let store = self.clone();
        Box::pin(async move { store.find(id).await.map_err(StorageError::from) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ping().await.map_err(StorageError::from) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.reconnect().await.map_err(StorageError::from) })
    }
}
