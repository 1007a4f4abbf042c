pub mod broadcaster;
pub mod game;
pub mod session;
pub mod storage;

use std::sync::Arc;

use crate::{config::AppConfig, dao::game_store::GameStore};

use self::{
    broadcaster::Broadcaster,
    session::{SessionLimits, SessionManager},
    storage::StorageSlot,
};

pub type SharedState = Arc<AppState>;

/// Central application state shared by every request handler.
pub struct AppState {
    config: AppConfig,
    storage: Arc<StorageSlot>,
    broadcaster: Broadcaster,
    sessions: SessionManager,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::build(config, StorageSlot::new())
    }

    /// Construct a state with `store` already installed.
    pub fn with_store(config: AppConfig, store: Arc<dyn GameStore>) -> SharedState {
        Self::build(config, StorageSlot::with_store(store))
    }

    fn build(config: AppConfig, storage: StorageSlot) -> SharedState {
        let storage = Arc::new(storage);
        let broadcaster = Broadcaster::new(config.observer_buffer);
        let sessions = SessionManager::new(
            storage.clone(),
            broadcaster.clone(),
            SessionLimits {
                max_players: Some(config.max_players),
            },
        );
        Arc::new(Self {
            config,
            storage,
            broadcaster,
            sessions,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Installed storage backend and degraded flag.
    pub fn storage(&self) -> &StorageSlot {
        &self.storage
    }

    /// Shared handle to the storage slot for the storage supervisor.
    pub fn storage_handle(&self) -> Arc<StorageSlot> {
        self.storage.clone()
    }

    /// Observer registry used by the push transports.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Authoritative game sessions.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}
