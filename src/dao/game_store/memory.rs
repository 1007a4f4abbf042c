//! Process-local store, used by default and in tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{self, BoxFuture};

use crate::{
    dao::{
        game_store::GameStore,
        storage::{StorageError, StorageResult},
    },
    state::game::{Game, GameId},
};

/// Keeps every game record in a concurrent map. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<DashMap<GameId, Game>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl GameStore for MemoryGameStore {
    fn insert_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>> {
        let result = match self.games.entry(game.id.clone()) {
            Entry::Occupied(entry) => Err(StorageError::already_exists(entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(game);
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }

    fn save_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>> {
        self.games.insert(game.id.clone(), game);
        Box::pin(future::ready(Ok(())))
    }

    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<Game>>> {
        let game = self.games.get(&id).map(|entry| entry.value().clone());
        Box::pin(future::ready(Ok(game)))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }
}
