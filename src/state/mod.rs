pub mod hub;
pub mod room;

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::{RwLock, watch};
use tokio::time::timeout;
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::{room_store::RoomStore, storage::StorageResult},
    error::ServiceError,
};

pub use self::hub::{Connection, ConnectionId, RoomHub};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, realtime hub and configuration.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    hub: RoomHub,
    config: Arc<AppConfig>,
    degraded: watch::Sender<bool>,
    store_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let store_timeout = config.store_timeout();
        Arc::new(Self {
            room_store: RwLock::new(None),
            hub: RoomHub::new(),
            config: Arc::new(config),
            degraded: degraded_tx,
            store_timeout,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Room store to serve a request with, failing while degraded.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn install_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Per-room publish/subscribe registry.
    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Await a store call, bounded by the configured store timeout.
    pub async fn store_call<T, Fut>(&self, operation: &'static str, call: Fut) -> Result<T, ServiceError>
    where
        Fut: Future<Output = StorageResult<T>>,
    {
        let Some(limit) = self.store_timeout else {
            return call.await.map_err(ServiceError::from);
        };

        match timeout(limit, call).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => {
                warn!(operation, timeout_ms = limit.as_millis(), "store call timed out");
                Err(ServiceError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{future, time::Duration};

    use super::*;
    use crate::dao::room_store::memory::MemoryRoomStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();

        assert!(state.is_degraded());
        assert!(matches!(
            state.require_room_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_room_store(Arc::new(MemoryRoomStore::default()))
            .await;

        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_room_store().await.is_ok());

        state.clear_room_store().await;
        assert!(state.is_degraded());
        assert!(state.room_store().await.is_none());
    }

    #[tokio::test]
    async fn degraded_flag_blocks_an_installed_store() {
        let state = AppState::new(AppConfig::default());
        state
            .install_room_store(Arc::new(MemoryRoomStore::default()))
            .await;

        state.update_degraded(true);
        assert!(matches!(
            state.require_room_store().await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn store_calls_time_out() {
        let mut config = AppConfig::default();
        config.storage.timeout_ms = 50;
        let state = AppState::new(config);

        let result: Result<(), _> = state
            .store_call("never", future::pending::<StorageResult<()>>())
            .await;
        assert!(matches!(result, Err(ServiceError::Timeout)));

        let quick = state
            .store_call("ready", async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(7)
            })
            .await;
        assert_eq!(quick.unwrap(), 7);
    }
}
