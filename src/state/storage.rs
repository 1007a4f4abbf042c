use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{dao::game_store::GameStore, error::ServiceError};

/// Holds the currently installed storage backend and the degraded flag.
///
/// The slot starts degraded until a backend is installed; the storage
/// supervisor flips the flag as connectivity changes.
pub struct StorageSlot {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
}

impl StorageSlot {
    /// Empty slot in degraded mode.
    pub fn new() -> Self {
        let (degraded, _rx) = watch::channel(true);
        Self {
            game_store: RwLock::new(None),
            degraded,
        }
    }

    /// Slot with a backend already installed and healthy.
    pub fn with_store(store: Arc<dyn GameStore>) -> Self {
        let (degraded, _rx) = watch::channel(false);
        Self {
            game_store: RwLock::new(Some(store)),
            degraded,
        }
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle for an operation, or [`ServiceError::Degraded`] when none is usable.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

impl Default for StorageSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::memory::MemoryGameStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let slot = StorageSlot::new();
        assert!(slot.is_degraded());
        assert!(matches!(
            slot.require_game_store().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = slot.degraded_watcher();
        slot.set_game_store(Arc::new(MemoryGameStore::new())).await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(slot.require_game_store().await.is_ok());
    }

    #[tokio::test]
    async fn degraded_flag_blocks_an_installed_store() {
        let slot = StorageSlot::with_store(Arc::new(MemoryGameStore::new()));
        slot.update_degraded(true);
        assert!(slot.game_store().await.is_some());
        assert!(slot.require_game_store().await.is_err());

        slot.clear_game_store().await;
        assert!(slot.game_store().await.is_none());
    }
}
