//! The grid cache connector.
//!
//! Construction validates the configuration synchronously and spawns a
//! supervisor task that connects to the grid. Readiness is observed through
//! [`GridCacheConnector::subscribe`], [`GridCacheConnector::wait_ready`] or
//! [`GridCacheConnector::is_ready`]. Operations issued before the connector is
//! ready fail with [`OperationError::NotReady`].

mod notifier;
mod supervisor;

pub use notifier::{LifecycleEvent, LifecycleSubscription};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::supervisor::{Phase, Shared, Supervisor};
use crate::config::{validate, ConnectorConfig};
use crate::error::{
    ConfigResult, ConnectionError, ConnectionResult, ConnectorFault, OperationError,
    OperationResult,
};
use crate::grid::{GridClient, GridMap, RedisGrid};
use crate::traits::CacheConnector;
use crate::types::{Capability, ConnectorState, ConnectorStats, HealthStatus, OperationKind};
use crate::{CONNECTOR_NAME, CONNECTOR_VERSION};

/// Cache connector backed by a distributed in-memory data grid
pub struct GridCacheConnector {
    shared: Arc<Shared>,
    supervisor: JoinHandle<()>,
}

impl GridCacheConnector {
    /// Validate `config` and start connecting to a Redis grid.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(config: &Value) -> ConfigResult<Self> {
        Self::with_client(config, Arc::new(RedisGrid::default()))
    }

    /// Validate `config` and start connecting through `client`.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn with_client(config: &Value, client: Arc<dyn GridClient>) -> ConfigResult<Self> {
        let config = validate(config)?;
        Self::from_config(config, client)
    }

    /// Start connecting with an already typed configuration.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn from_config(config: ConnectorConfig, client: Arc<dyn GridClient>) -> ConfigResult<Self> {
        config.validate()?;
        let addresses = config.network_config.parse_addresses()?;

        let shared = Arc::new(Shared::new(config, client));
        info!(
            connector = %shared.instance_id,
            "Creating {} {} for map {} ({} grid, {} address(es))",
            CONNECTOR_NAME,
            CONNECTOR_VERSION,
            shared.config.map_name,
            shared.client.backend_name(),
            addresses.len()
        );

        let supervisor = Supervisor::spawn(Arc::clone(&shared), addresses);
        Ok(Self { shared, supervisor })
    }

    /// Identifier carried by this connector's log lines
    pub fn instance_id(&self) -> Uuid {
        self.shared.instance_id
    }

    /// Validated configuration
    pub fn config(&self) -> &ConnectorConfig {
        &self.shared.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectorState {
        self.shared.state()
    }

    /// Whether operations are accepted
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectorState::Ready
    }

    /// Subscribe to lifecycle events, starting with the connect outcome if
    /// it was already emitted
    pub fn subscribe(&self) -> LifecycleSubscription {
        self.shared.notifier.subscribe()
    }

    /// Wait for the connect sequence to finish
    pub async fn wait_ready(&self) -> ConnectionResult<()> {
        let mut phase = self.shared.phase.subscribe();
        loop {
            let current = phase.borrow_and_update().clone();
            match current {
                Phase::Ready => return Ok(()),
                Phase::Errored(error) => return Err(error),
                Phase::NotReady => {}
            }
            if phase.changed().await.is_err() {
                return Err(ConnectionError::Lost(
                    "connection supervisor stopped".to_string(),
                ));
            }
        }
    }

    /// Snapshot of connection and operation counters
    pub fn stats(&self) -> ConnectorStats {
        self.shared.stats.snapshot()
    }

    /// Ping the grid through the live connection
    pub async fn health_check(&self) -> HealthStatus {
        let map = match (self.state(), self.shared.handle.get()) {
            (ConnectorState::NotReady, _) => return HealthStatus::Unknown,
            (ConnectorState::Errored, _) => return HealthStatus::Unhealthy,
            (ConnectorState::Ready, None) => return HealthStatus::Unknown,
            (ConnectorState::Ready, Some(map)) => Arc::clone(map),
        };

        let timeout = self.shared.config.operation_timeout();
        match tokio::time::timeout(timeout, map.ping()).await {
            Ok(Ok(())) => HealthStatus::Healthy,
            Ok(Err(e)) => {
                warn!(connector = %self.shared.instance_id, "Grid health check failed: {}", e);
                HealthStatus::Unhealthy
            }
            Err(_) => HealthStatus::Degraded,
        }
    }

    /// Look up `key`. `Ok(None)` when it was never set or has been deleted.
    pub async fn get(&self, key: &str) -> OperationResult<Option<Value>> {
        self.dispatch(OperationKind::Get, key, |map| async move { map.get(key).await })
            .await
    }

    /// Store `value` under `key`, replacing any previous value
    pub async fn set(&self, key: &str, value: Value) -> OperationResult<()> {
        self.dispatch(OperationKind::Set, key, |map| async move {
            map.set(key, &value).await
        })
        .await
    }

    /// Remove `key`. Removing an absent key succeeds.
    pub async fn delete(&self, key: &str) -> OperationResult<()> {
        self.dispatch(OperationKind::Delete, key, |map| async move {
            map.delete(key).await.map(|removed| {
                if !removed {
                    debug!("Delete of absent key {}", key);
                }
            })
        })
        .await
    }

    /// Look up `key` and deserialize it into `T`
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> OperationResult<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` and store it under `key`
    pub async fn set_from<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> OperationResult<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }

    fn ready_map(&self) -> OperationResult<Arc<dyn GridMap>> {
        let state = self.state();
        match (state, self.shared.handle.get()) {
            (ConnectorState::Ready, Some(map)) => Ok(Arc::clone(map)),
            _ => {
                self.shared.stats.record_rejected();
                Err(OperationError::NotReady(state))
            }
        }
    }

    async fn dispatch<T, F, Fut>(&self, kind: OperationKind, key: &str, call: F) -> OperationResult<T>
    where
        F: FnOnce(Arc<dyn GridMap>) -> Fut,
        Fut: Future<Output = OperationResult<T>>,
    {
        let map = self.ready_map()?;
        let timeout = self.shared.config.operation_timeout();

        let result = match tokio::time::timeout(timeout, call(map)).await {
            Ok(result) => result,
            Err(_) => Err(OperationError::Timeout(timeout)),
        };

        match &result {
            Ok(_) => self.shared.stats.record_success(kind),
            Err(e) => {
                self.shared.stats.record_failure();
                warn!(
                    connector = %self.shared.instance_id,
                    "Grid {} of key {} failed: {}", kind, key, e
                );
                if e.is_connection_loss() {
                    self.shared
                        .notifier
                        .emit(LifecycleEvent::Error(ConnectorFault::Operation(e.clone())));
                }
            }
        }

        result
    }
}

impl Drop for GridCacheConnector {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

#[async_trait]
impl CacheConnector for GridCacheConnector {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    fn version(&self) -> &str {
        CONNECTOR_VERSION
    }

    fn backend_name(&self) -> &str {
        self.shared.client.backend_name()
    }

    fn is_ready(&self) -> bool {
        GridCacheConnector::is_ready(self)
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::Read | Capability::Write | Capability::Delete
        )
    }

    async fn get(&self, key: &str) -> OperationResult<Option<Value>> {
        GridCacheConnector::get(self, key).await
    }

    async fn set(&self, key: &str, value: Value) -> OperationResult<()> {
        GridCacheConnector::set(self, key, value).await
    }

    async fn delete(&self, key: &str) -> OperationResult<()> {
        GridCacheConnector::delete(self, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemoryGrid;
    use serde_json::json;

    fn settings() -> Value {
        json!({
            "mapName": "deepstreamCache",
            "networkConfig": {
                "addresses": ["localhost"],
                "connectionAttemptLimit": 1,
                "connectionTimeout": 200
            }
        })
    }

    #[tokio::test]
    async fn test_invalid_config_spawns_nothing() {
        let grid = MemoryGrid::new();
        let result = GridCacheConnector::with_client(&json!("gibberish"), Arc::new(grid.clone()));
        assert!(result.is_err());

        tokio::task::yield_now().await;
        assert_eq!(grid.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_operation_timeout() {
        let grid = MemoryGrid::new();
        let mut config = validate(&settings()).unwrap();
        config.operation_timeout = 20;

        let connector = GridCacheConnector::from_config(config, Arc::new(grid)).unwrap();
        connector.wait_ready().await.unwrap();

        let result = connector
            .dispatch(OperationKind::Get, "slow", |_map| async move {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(OperationError::Timeout(_))));
        assert_eq!(connector.stats().failed_operations, 1);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
        struct Profile {
            firstname: String,
        }

        let connector =
            GridCacheConnector::with_client(&settings(), Arc::new(MemoryGrid::new())).unwrap();
        connector.wait_ready().await.unwrap();

        let profile = Profile {
            firstname: "Wolfram".to_string(),
        };
        connector.set_from("profile", &profile).await.unwrap();

        let loaded: Option<Profile> = connector.get_as("profile").await.unwrap();
        assert_eq!(loaded, Some(profile));

        connector.set("profile", json!(17)).await.unwrap();
        let mismatched = connector.get_as::<Profile>("profile").await;
        assert!(matches!(mismatched, Err(OperationError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_health_check_follows_state() {
        let grid = MemoryGrid::new();
        grid.set_connect_delay(std::time::Duration::from_millis(30));
        let connector =
            GridCacheConnector::with_client(&settings(), Arc::new(grid.clone())).unwrap();

        assert_eq!(connector.health_check().await, HealthStatus::Unknown);

        connector.wait_ready().await.unwrap();
        assert_eq!(connector.health_check().await, HealthStatus::Healthy);

        grid.set_fail_operations(true);
        assert_eq!(connector.health_check().await, HealthStatus::Unhealthy);
    }
}
