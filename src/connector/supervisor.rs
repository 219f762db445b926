use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::notifier::{LifecycleEvent, Notifier};
use crate::config::ConnectorConfig;
use crate::error::{ConnectionError, ConnectionResult, ConnectorFault};
use crate::grid::{GridAddress, GridClient, GridMap};
use crate::types::{ConnectorState, StatsRecorder};

/// Internal lifecycle phase, carrying the terminal connection error
#[derive(Debug, Clone)]
pub(crate) enum Phase {
    NotReady,
    Ready,
    Errored(ConnectionError),
}

impl Phase {
    pub fn state(&self) -> ConnectorState {
        match self {
            Phase::NotReady => ConnectorState::NotReady,
            Phase::Ready => ConnectorState::Ready,
            Phase::Errored(_) => ConnectorState::Errored,
        }
    }
}

/// State shared between a connector and its supervisor task
pub(crate) struct Shared {
    pub instance_id: Uuid,
    pub config: ConnectorConfig,
    pub client: Arc<dyn GridClient>,
    pub phase: watch::Sender<Phase>,
    /// Written once by the supervisor, read by operations
    pub handle: OnceLock<Arc<dyn GridMap>>,
    pub notifier: Notifier,
    pub stats: StatsRecorder,
}

impl Shared {
    pub fn new(config: ConnectorConfig, client: Arc<dyn GridClient>) -> Self {
        let instance_id = Uuid::new_v4();
        let (phase, _) = watch::channel(Phase::NotReady);
        Self {
            instance_id,
            config,
            client,
            phase,
            handle: OnceLock::new(),
            notifier: Notifier::new(instance_id),
            stats: StatsRecorder::default(),
        }
    }

    pub fn state(&self) -> ConnectorState {
        self.phase.borrow().state()
    }
}

/// Drives `NotReady -> Ready | Errored` for one connector
pub(crate) struct Supervisor {
    shared: Arc<Shared>,
    addresses: Vec<GridAddress>,
}

enum Outcome {
    Connected(Arc<dyn GridMap>),
    Failed(ConnectionError),
}

impl Supervisor {
    pub fn spawn(shared: Arc<Shared>, addresses: Vec<GridAddress>) -> JoinHandle<()> {
        let supervisor = Self { shared, addresses };
        tokio::spawn(supervisor.run())
    }

    async fn run(self) {
        match self.connect().await {
            Outcome::Connected(map) => self.on_connected(map),
            Outcome::Failed(error) => self.on_failed(error),
        }
    }

    async fn connect(&self) -> Outcome {
        let id = self.shared.instance_id;
        let network = &self.shared.config.network_config;
        let limit = network.connection_attempt_limit;
        let timeout = network.connection_timeout();
        let period = network.connection_attempt_period();

        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 1..=limit {
            attempts = attempt;
            self.shared.stats.record_attempt();
            debug!(connector = %id, "Connection attempt {}/{}", attempt, limit);

            match self.attempt(timeout).await {
                Ok(map) => return Outcome::Connected(map),
                Err(e) if !e.is_retryable() => {
                    warn!(connector = %id, "Connection attempt {}/{} failed permanently: {}", attempt, limit, e);
                    return Outcome::Failed(e);
                }
                Err(e) => {
                    warn!(connector = %id, "Connection attempt {}/{} failed: {}", attempt, limit, e);
                    last_error = Some(e);
                }
            }

            if attempt < limit && !period.is_zero() {
                debug!(connector = %id, "Retrying connection in {:?}", period);
                tokio::time::sleep(period).await;
            }
        }

        let last = last_error
            .unwrap_or_else(|| ConnectionError::Lost("no connection attempt was made".to_string()));
        Outcome::Failed(ConnectionError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }

    /// One sweep over the configured members, in order
    async fn attempt(&self, timeout: Duration) -> ConnectionResult<Arc<dyn GridMap>> {
        let client = &self.shared.client;
        let map_name = &self.shared.config.map_name;
        let mut last_error = None;

        for address in &self.addresses {
            let authority = address.authority(client.default_port());

            match tokio::time::timeout(timeout, client.connect(address, map_name)).await {
                Ok(Ok(map)) => {
                    debug!(connector = %self.shared.instance_id, "Connected to {}", authority);
                    return Ok(map);
                }
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => {
                    debug!(connector = %self.shared.instance_id, "Member {} unavailable: {}", authority, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    debug!(connector = %self.shared.instance_id, "Member {} timed out", authority);
                    last_error = Some(ConnectionError::Timeout {
                        address: authority,
                        timeout,
                    });
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ConnectionError::Lost("no grid address configured".to_string())))
    }

    fn on_connected(&self, map: Arc<dyn GridMap>) {
        if self.shared.handle.set(map).is_err() {
            warn!(connector = %self.shared.instance_id, "Grid handle was already set");
            return;
        }
        self.shared.stats.record_connected();
        self.shared.phase.send_replace(Phase::Ready);

        info!(
            connector = %self.shared.instance_id,
            "Connector ready: map {} on {} grid",
            self.shared.config.map_name,
            self.shared.client.backend_name()
        );
        self.shared.notifier.emit(LifecycleEvent::Ready);
    }

    fn on_failed(&self, error: ConnectionError) {
        self.shared.phase.send_replace(Phase::Errored(error.clone()));

        warn!(connector = %self.shared.instance_id, "Connector failed to connect: {}", error);
        self.shared
            .notifier
            .emit(LifecycleEvent::Error(ConnectorFault::Connection(error)));
    }
}
