//! Per-game registry of live observers fed with full game snapshots.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    state::game::{Game, GameId},
};

/// Identifier of one registered observer.
pub type ObserverId = Uuid;

/// Serialized `game-update` message, encoded once and shared by every observer.
#[derive(Debug, Clone)]
pub struct GameUpdate {
    payload: Arc<str>,
}

impl GameUpdate {
    /// Encode the full snapshot of `game` as a push message.
    pub fn encode(game: &Game) -> serde_json::Result<Self> {
        let payload = serde_json::to_string(&ServerMessage::game_update(game))?;
        Ok(Self {
            payload: payload.into(),
        })
    }

    /// JSON text of the message.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Sending half of an observer, handed to [`Broadcaster::subscribe`].
pub struct Observer {
    id: ObserverId,
    tx: mpsc::Sender<GameUpdate>,
}

impl Observer {
    /// Identifier to pass to [`Broadcaster::unsubscribe`].
    pub fn id(&self) -> ObserverId {
        self.id
    }
}

/// Fans game snapshots out to every observer registered for a game.
///
/// Sends never wait: each observer owns a bounded queue, and an observer whose
/// queue is closed or full is evicted. Its transport then closes the
/// connection and the client re-subscribes for a fresh snapshot.
#[derive(Clone)]
pub struct Broadcaster {
    observers: Arc<DashMap<GameId, HashMap<ObserverId, mpsc::Sender<GameUpdate>>>>,
    buffer: usize,
}

impl Broadcaster {
    /// Create a broadcaster whose observers queue at most `buffer` pending updates.
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: Arc::new(DashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Allocate a new observer and the receiver its transport reads from.
    pub fn observer(&self) -> (Observer, mpsc::Receiver<GameUpdate>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        (
            Observer {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    /// Register `observer` for `game_id`, sending `snapshot` to it first when the game exists.
    pub fn subscribe(&self, game_id: &GameId, observer: Observer, snapshot: Option<&Game>) {
        if let Some(game) = snapshot {
            match GameUpdate::encode(game) {
                Ok(update) => {
                    if observer.tx.try_send(update).is_err() {
                        debug!(game_id = %game_id, observer = %observer.id, "observer gone before initial snapshot");
                        return;
                    }
                }
                Err(err) => {
                    warn!(game_id = %game_id, error = %err, "failed to encode game snapshot");
                }
            }
        }

        self.observers
            .entry(game_id.clone())
            .or_default()
            .insert(observer.id, observer.tx);
        debug!(game_id = %game_id, observer = %observer.id, "observer subscribed");
    }

    /// Remove an observer. Returns whether it was still registered.
    pub fn unsubscribe(&self, game_id: &GameId, observer_id: ObserverId) -> bool {
        let removed = self
            .observers
            .get_mut(game_id)
            .map(|mut set| set.remove(&observer_id).is_some())
            .unwrap_or(false);
        self.observers.remove_if(game_id, |_, set| set.is_empty());
        removed
    }

    /// Push the full snapshot of `game` to every observer of `game_id`.
    ///
    /// Returns the number of observers that accepted the update.
    pub fn broadcast(&self, game_id: &GameId, game: &Game) -> usize {
        let Some(mut set) = self.observers.get_mut(game_id) else {
            return 0;
        };

        let update = match GameUpdate::encode(game) {
            Ok(update) => update,
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "failed to encode game update");
                return 0;
            }
        };

        set.retain(|observer_id, tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(game_id = %game_id, observer = %observer_id, "observer lagging behind; evicting");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(game_id = %game_id, observer = %observer_id, "observer closed; evicting");
                false
            }
        });

        let delivered = set.len();
        drop(set);
        self.observers.remove_if(game_id, |_, set| set.is_empty());
        delivered
    }

    /// Number of observers currently registered for `game_id`.
    pub fn observer_count(&self, game_id: &GameId) -> usize {
        self.observers
            .get(game_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }
}
