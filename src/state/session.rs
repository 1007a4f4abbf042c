//! Authoritative owner of game sessions.
//!
//! Every operation on a game runs under that game's async mutex, so two
//! mutations of the same game never interleave while different games proceed
//! concurrently. A mutation is applied to a copy, persisted, and only then
//! committed to the cache and broadcast.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    error::ServiceError,
    state::{
        broadcaster::{Broadcaster, Observer, ObserverId},
        game::{Game, GameId, NewPlayer, Player, Round, ScoreEntry},
        storage::StorageSlot,
    },
};

type SessionSlot = Arc<Mutex<Option<Game>>>;

/// Tunables for session invariants.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionLimits {
    /// Largest roster a game accepts, `None` for the palette limit only.
    pub max_players: Option<usize>,
}

/// Serializes mutations per game, persists them and notifies observers.
pub struct SessionManager {
    storage: Arc<StorageSlot>,
    broadcaster: Broadcaster,
    sessions: DashMap<GameId, SessionSlot>,
    limits: SessionLimits,
}

/// Keeps a session slot alive for the duration of an operation and lets the
/// manager drop the cached game once nobody uses or observes it.
struct SessionLease<'a> {
    manager: &'a SessionManager,
    id: GameId,
    slot: Option<SessionSlot>,
}

impl SessionLease<'_> {
    async fn lock(&self) -> MutexGuard<'_, Option<Game>> {
        match &self.slot {
            Some(slot) => slot.lock().await,
            None => unreachable!("session slot is only taken on drop"),
        }
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.slot.take();
        self.manager.release(&self.id);
    }
}

impl SessionManager {
    /// Build a manager around the shared storage slot and broadcaster.
    pub fn new(storage: Arc<StorageSlot>, broadcaster: Broadcaster, limits: SessionLimits) -> Self {
        Self {
            storage,
            broadcaster,
            sessions: DashMap::new(),
            limits,
        }
    }

    /// Create and persist an empty game.
    pub async fn create_game(&self, id: GameId, name: Option<String>) -> Result<Game, ServiceError> {
        let store = self.storage.require_game_store().await?;
        let lease = self.lease(&id);
        let mut session = lease.lock().await;

        if session.is_some() {
            return Err(ServiceError::Conflict("Game already exists".into()));
        }

        let game = Game::new(id.clone(), name);
        store
            .insert_game(game.clone())
            .await
            .map_err(|err| match err {
                StorageError::AlreadyExists { .. } => {
                    ServiceError::Conflict("Game already exists".into())
                }
                other => other.into(),
            })?;

        info!(game_id = %id, name = %game.name, "game created");
        self.broadcaster.broadcast(&id, &game);
        *session = Some(game.clone());
        Ok(game)
    }

    /// Current state of a game.
    pub async fn get_game(&self, id: &GameId) -> Result<Game, ServiceError> {
        let store = self.storage.require_game_store().await?;
        let lease = self.lease(id);
        let mut session = lease.lock().await;
        let game = load(store.as_ref(), id, &mut session).await?;
        Ok(game.clone())
    }

    /// Append a player, enforcing unique names and colors.
    pub async fn add_player(&self, id: &GameId, request: NewPlayer) -> Result<Player, ServiceError> {
        let store = self.storage.require_game_store().await?;
        let lease = self.lease(id);
        let mut session = lease.lock().await;
        let mut next = load(store.as_ref(), id, &mut session).await?.clone();
        let player = next.add_player(request, self.limits.max_players)?.clone();
        persist(store.as_ref(), &mut session, &next).await?;

        info!(
            game_id = %id,
            player_id = %player.id,
            name = %player.name,
            color = %player.train_color,
            offline = player.is_offline,
            "player added"
        );
        self.broadcaster.broadcast(id, &next);
        *session = Some(next);
        Ok(player)
    }

    /// Record the next round. `suggested_round` is advisory and only logged when it disagrees.
    pub async fn submit_round(
        &self,
        id: &GameId,
        entries: Vec<ScoreEntry>,
        suggested_round: Option<i64>,
    ) -> Result<Round, ServiceError> {
        let store = self.storage.require_game_store().await?;
        let lease = self.lease(id);
        let mut session = lease.lock().await;
        let mut next = load(store.as_ref(), id, &mut session).await?.clone();
        let round = next.record_round(&entries).clone();
        if let Some(suggested) = suggested_round {
            if suggested != i64::from(round.round_number) {
                warn!(
                    game_id = %id,
                    suggested,
                    assigned = round.round_number,
                    "client round number ignored"
                );
            }
        }
        persist(store.as_ref(), &mut session, &next).await?;

        info!(game_id = %id, round = round.round_number, "round recorded");
        self.broadcaster.broadcast(id, &next);
        *session = Some(next);
        Ok(round)
    }

    /// Register an observer and send it the current snapshot when the game exists.
    ///
    /// Registration happens under the session lock, so no update can slip
    /// between the snapshot and the first broadcast.
    pub async fn subscribe(&self, id: &GameId, observer: Observer) {
        let lease = self.lease(id);
        let mut session = lease.lock().await;

        if session.is_none() {
            match self.storage.require_game_store().await {
                Ok(store) => match store.find_game(id.clone()).await {
                    Ok(found) => *session = found,
                    Err(err) => warn!(game_id = %id, error = %err, "failed to load game for observer"),
                },
                Err(_) => debug!(game_id = %id, "storage degraded; subscribing without snapshot"),
            }
        }

        self.broadcaster.subscribe(id, observer, session.as_ref());
    }

    /// Remove an observer; the cached game is dropped once nobody observes it.
    pub fn unsubscribe(&self, id: &GameId, observer_id: ObserverId) {
        self.broadcaster.unsubscribe(id, observer_id);
        self.release(id);
    }

    /// Number of games currently held in memory.
    pub fn loaded_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn lease(&self, id: &GameId) -> SessionLease<'_> {
        let slot = self.sessions.entry(id.clone()).or_default().clone();
        SessionLease {
            manager: self,
            id: id.clone(),
            slot: Some(slot),
        }
    }

    /// Drop the cached game when no operation holds its slot and nobody observes it.
    fn release(&self, id: &GameId) {
        let removed = self.sessions.remove_if(id, |_, slot| {
            Arc::strong_count(slot) == 1 && self.broadcaster.observer_count(id) == 0
        });
        if removed.is_some() {
            debug!(game_id = %id, "session released");
        }
    }
}

/// Load the game into the session cache when needed.
async fn load<'g>(
    store: &dyn GameStore,
    id: &GameId,
    session: &'g mut Option<Game>,
) -> Result<&'g mut Game, ServiceError> {
    if session.is_none() {
        *session = store.find_game(id.clone()).await?;
    }
    session
        .as_mut()
        .ok_or_else(|| ServiceError::NotFound("Game not found".into()))
}

/// Write `next` with the cached copy cleared until the store confirms.
///
/// If the caller is dropped mid-write the outcome is unknown, so the next
/// operation reloads from the store instead of trusting the stale cache.
async fn persist(
    store: &dyn GameStore,
    session: &mut Option<Game>,
    next: &Game,
) -> Result<(), ServiceError> {
    *session = None;
    store.save_game(next.clone()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use futures::future::{self, BoxFuture};
    use serde_json::Value;

    use super::*;
    use crate::{
        dao::{game_store::memory::MemoryGameStore, storage::StorageResult},
        state::game::TrainColor,
    };

    /// Store that reads from memory but refuses every write.
    struct ReadOnlyStore(MemoryGameStore);

    fn refused() -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Err(StorageError::unavailable(
            "read only".into(),
            io::Error::other("disk full"),
        ))))
    }

    impl GameStore for ReadOnlyStore {
        fn insert_game(&self, _game: Game) -> BoxFuture<'static, StorageResult<()>> {
            refused()
        }

        fn save_game(&self, _game: Game) -> BoxFuture<'static, StorageResult<()>> {
            refused()
        }

        fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<Game>>> {
            self.0.find_game(id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(future::ready(Ok(())))
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(future::ready(Ok(())))
        }
    }

    /// Store whose writes land immediately but are never acknowledged.
    struct UnacknowledgedStore(MemoryGameStore);

    impl GameStore for UnacknowledgedStore {
        fn insert_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>> {
            self.0.insert_game(game)
        }

        fn save_game(&self, game: Game) -> BoxFuture<'static, StorageResult<()>> {
            let written = self.0.save_game(game);
            Box::pin(async move {
                written.await?;
                future::pending::<StorageResult<()>>().await
            })
        }

        fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<Game>>> {
            self.0.find_game(id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(future::ready(Ok(())))
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(future::ready(Ok(())))
        }
    }

    fn manager_with(store: Arc<dyn GameStore>) -> (SessionManager, Broadcaster) {
        let broadcaster = Broadcaster::new(8);
        let manager = SessionManager::new(
            Arc::new(StorageSlot::with_store(store)),
            broadcaster.clone(),
            SessionLimits::default(),
        );
        (manager, broadcaster)
    }

    fn manager() -> (SessionManager, MemoryGameStore, Broadcaster) {
        let store = MemoryGameStore::new();
        let (manager, broadcaster) = manager_with(Arc::new(store.clone()));
        (manager, store, broadcaster)
    }

    fn id(raw: &str) -> GameId {
        GameId::parse(raw).unwrap()
    }

    fn player(name: &str, color: TrainColor) -> NewPlayer {
        NewPlayer {
            name: name.into(),
            train_color: color,
            is_offline: false,
        }
    }

    fn entry(player: &Player, score: u32) -> ScoreEntry {
        ScoreEntry {
            player_id: player.id.to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn creating_twice_conflicts_and_keeps_the_first_game() {
        let (manager, store, _) = manager();
        let first = manager
            .create_game(id("ABC123"), Some("first".into()))
            .await
            .unwrap();

        let err = manager
            .create_game(id("abc123"), Some("second".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        assert_eq!(manager.get_game(&id("ABC123")).await.unwrap(), first);
        let stored = store.find_game(id("ABC123")).await.unwrap();
        assert_eq!(stored, Some(first));
    }

    #[tokio::test]
    async fn unknown_games_are_not_found() {
        let (manager, _, _) = manager();
        let missing = id("NOPE42");

        assert!(matches!(
            manager.get_game(&missing).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            manager.add_player(&missing, player("Ann", TrainColor::Red)).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            manager.submit_round(&missing, Vec::new(), None).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(manager.loaded_sessions(), 0);
    }

    #[tokio::test]
    async fn end_to_end_round_scoring() {
        let (manager, store, _) = manager();
        let game_id = id("Z9X2K1");
        manager.create_game(game_id.clone(), None).await.unwrap();

        let ann = manager
            .add_player(&game_id, player("Ann", TrainColor::Red))
            .await
            .unwrap();
        let bo = manager
            .add_player(&game_id, player("Bo", TrainColor::Blue))
            .await
            .unwrap();

        let round = manager
            .submit_round(&game_id, vec![entry(&ann, 15), entry(&bo, 0)], Some(1))
            .await
            .unwrap();
        assert_eq!(round.round_number, 1);

        let game = manager.get_game(&game_id).await.unwrap();
        assert_eq!(
            game.players
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>(),
            vec!["Ann", "Bo"]
        );
        assert_eq!(
            game.rounds[0]
                .scores
                .iter()
                .map(|s| s.score)
                .collect::<Vec<_>>(),
            vec![15, 0]
        );
        assert_eq!(game.current_round(), 2);
        assert_eq!(store.find_game(game_id).await.unwrap(), Some(game));
    }

    #[tokio::test]
    async fn round_numbers_ignore_client_suggestions() {
        let (manager, _, _) = manager();
        let game_id = id("ROUNDS");
        manager.create_game(game_id.clone(), None).await.unwrap();
        let ann = manager
            .add_player(&game_id, player("Ann", TrainColor::Red))
            .await
            .unwrap();

        for (expected, suggested) in [(1, Some(7)), (2, None), (3, Some(1))] {
            let round = manager
                .submit_round(&game_id, vec![entry(&ann, 5)], suggested)
                .await
                .unwrap();
            assert_eq!(round.round_number, expected);
        }

        let game = manager.get_game(&game_id).await.unwrap();
        assert_eq!(game.players[0].scores, vec![5, 5, 5]);
    }

    #[tokio::test]
    async fn conflicting_player_leaves_game_unchanged() {
        let (manager, _, broadcaster) = manager();
        let game_id = id("CLASH1");
        manager.create_game(game_id.clone(), None).await.unwrap();
        manager
            .add_player(&game_id, player("Ann", TrainColor::Red))
            .await
            .unwrap();
        let before = manager.get_game(&game_id).await.unwrap();

        let (observer, mut rx) = broadcaster.observer();
        manager.subscribe(&game_id, observer).await;
        rx.recv().await.unwrap();

        let name_clash = manager
            .add_player(&game_id, player("ANN", TrainColor::Blue))
            .await;
        let color_clash = manager
            .add_player(&game_id, player("Bo", TrainColor::Red))
            .await;
        assert!(matches!(name_clash, Err(ServiceError::Conflict(_))));
        assert!(matches!(color_clash, Err(ServiceError::Conflict(_))));

        assert_eq!(manager.get_game(&game_id).await.unwrap(), before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_joins_are_not_lost() {
        let (manager, store, _) = manager();
        let manager = Arc::new(manager);
        let game_id = id("RACE01");
        manager.create_game(game_id.clone(), None).await.unwrap();

        let joins = TrainColor::ALL
            .into_iter()
            .enumerate()
            .map(|(index, color)| {
                let manager = manager.clone();
                let game_id = game_id.clone();
                tokio::spawn(async move {
                    manager
                        .add_player(&game_id, player(&format!("player{index}"), color))
                        .await
                })
            })
            .collect::<Vec<_>>();

        for join in joins {
            join.await.unwrap().unwrap();
        }

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.players.len(), TrainColor::ALL.len());
        assert_eq!(manager.loaded_sessions(), 0);
    }

    #[tokio::test]
    async fn subscribers_get_full_snapshots_then_updates() {
        let (manager, _, broadcaster) = manager();
        let game_id = id("SNAP01");
        manager.create_game(game_id.clone(), None).await.unwrap();
        for (name, color) in [
            ("Ann", TrainColor::Red),
            ("Bo", TrainColor::Blue),
            ("Cy", TrainColor::Green),
        ] {
            manager
                .add_player(&game_id, player(name, color))
                .await
                .unwrap();
        }
        manager.submit_round(&game_id, Vec::new(), None).await.unwrap();
        manager.submit_round(&game_id, Vec::new(), None).await.unwrap();

        let (observer, mut rx) = broadcaster.observer();
        manager.subscribe(&game_id, observer).await;

        let snapshot: Value = serde_json::from_str(rx.recv().await.unwrap().payload()).unwrap();
        assert_eq!(snapshot["game"]["players"].as_array().unwrap().len(), 3);
        assert_eq!(snapshot["game"]["rounds"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot["game"]["currentRound"], 3);

        manager.submit_round(&game_id, Vec::new(), None).await.unwrap();
        let update: Value = serde_json::from_str(rx.recv().await.unwrap().payload()).unwrap();
        assert_eq!(update["game"]["rounds"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn early_observers_receive_the_created_game() {
        let (manager, _, broadcaster) = manager();
        let game_id = id("EARLY1");

        let (observer, mut rx) = broadcaster.observer();
        manager.subscribe(&game_id, observer).await;
        assert!(rx.try_recv().is_err());

        manager.create_game(game_id.clone(), None).await.unwrap();
        let update: Value = serde_json::from_str(rx.recv().await.unwrap().payload()).unwrap();
        assert_eq!(update["game"]["id"], "EARLY1");
    }

    #[tokio::test]
    async fn sessions_stay_cached_only_while_observed() {
        let (manager, _, broadcaster) = manager();
        let game_id = id("CACHE1");
        manager.create_game(game_id.clone(), None).await.unwrap();
        assert_eq!(manager.loaded_sessions(), 0);

        let (observer, _rx) = broadcaster.observer();
        let observer_id = observer.id();
        manager.subscribe(&game_id, observer).await;
        assert_eq!(manager.loaded_sessions(), 1);

        manager.unsubscribe(&game_id, observer_id);
        assert_eq!(manager.loaded_sessions(), 0);
        assert!(manager.get_game(&game_id).await.is_ok());
    }

    #[tokio::test]
    async fn failed_writes_are_not_committed_or_broadcast() {
        let memory = MemoryGameStore::new();
        let game_id = id("STUCK1");
        memory
            .insert_game(Game::new(game_id.clone(), None))
            .await
            .unwrap();
        let (manager, broadcaster) = manager_with(Arc::new(ReadOnlyStore(memory)));

        let (observer, mut rx) = broadcaster.observer();
        manager.subscribe(&game_id, observer).await;
        rx.recv().await.unwrap();

        let err = manager
            .add_player(&game_id, player("Ann", TrainColor::Red))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert!(manager.get_game(&game_id).await.unwrap().players.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn abandoned_writes_do_not_leave_a_stale_cache() {
        let memory = MemoryGameStore::new();
        let game_id = id("DROP01");
        memory
            .insert_game(Game::new(game_id.clone(), None))
            .await
            .unwrap();
        let (manager, broadcaster) = manager_with(Arc::new(UnacknowledgedStore(memory)));

        let (observer, mut rx) = broadcaster.observer();
        manager.subscribe(&game_id, observer).await;
        rx.recv().await.unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            manager.add_player(&game_id, player("Ann", TrainColor::Red)),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(manager.loaded_sessions(), 1);

        let game = manager.get_game(&game_id).await.unwrap();
        assert_eq!(game.players.len(), 1);
        assert_eq!(game.players[0].name, "Ann");
    }

    #[tokio::test]
    async fn degraded_storage_is_reported() {
        let manager = SessionManager::new(
            Arc::new(StorageSlot::new()),
            Broadcaster::new(4),
            SessionLimits::default(),
        );
        assert!(matches!(
            manager.create_game(id("DOWN01"), None).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn roster_cap_is_enforced() {
        let store = MemoryGameStore::new();
        let manager = SessionManager::new(
            Arc::new(StorageSlot::with_store(Arc::new(store))),
            Broadcaster::new(4),
            SessionLimits {
                max_players: Some(2),
            },
        );
        let game_id = id("FULL01");
        manager.create_game(game_id.clone(), None).await.unwrap();
        manager
            .add_player(&game_id, player("Ann", TrainColor::Red))
            .await
            .unwrap();
        manager
            .add_player(&game_id, player("Bo", TrainColor::Blue))
            .await
            .unwrap();

        let err = manager
            .add_player(&game_id, player("Cy", TrainColor::Green))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ref message) if message == "Game is full"));
    }
}
