#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::{
    dao::storage::StorageResult,
    state::game::{Game, GameId},
};

/// Key-value persistence of one [`Game`] record per game identifier.
pub trait GameStore: Send + Sync {
    /// Store a new record, failing with [`StorageError::AlreadyExists`](crate::dao::storage::StorageError::AlreadyExists)
    /// when the identifier is taken.
    fn insert_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>>;
    /// Upsert a record, replacing any previous state.
    fn save_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<Game>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
