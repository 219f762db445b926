use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ConnectionError, ConnectionResult, OperationError, OperationResult};
use crate::grid::{GridAddress, GridClient, GridMap};

const MEMORY_DEFAULT_PORT: u16 = 5701;

/// In-process data grid.
///
/// Every clone shares the same maps, so a test can keep one handle to inspect
/// or sabotage the grid while a connector talks to another. Only hosts listed
/// as members accept connections.
#[derive(Clone)]
pub struct MemoryGrid {
    inner: Arc<Inner>,
}

struct Inner {
    maps: RwLock<HashMap<String, HashMap<String, Value>>>,
    members: std::sync::RwLock<HashSet<String>>,
    connect_delay: std::sync::RwLock<Duration>,
    scripted_failures: std::sync::Mutex<VecDeque<ConnectionError>>,
    fail_operations: AtomicBool,
    connection_lost: AtomicBool,
    connect_calls: AtomicU32,
}

impl Default for MemoryGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGrid {
    /// Grid with a single member reachable as `localhost`
    pub fn new() -> Self {
        Self::with_members(["localhost"])
    }

    pub fn with_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(Inner {
                maps: RwLock::new(HashMap::new()),
                members: std::sync::RwLock::new(members.into_iter().map(Into::into).collect()),
                connect_delay: std::sync::RwLock::new(Duration::ZERO),
                scripted_failures: std::sync::Mutex::new(VecDeque::new()),
                fail_operations: AtomicBool::new(false),
                connection_lost: AtomicBool::new(false),
                connect_calls: AtomicU32::new(0),
            }),
        }
    }

    /// Delay every connect by `delay` before answering
    pub fn set_connect_delay(&self, delay: Duration) {
        if let Ok(mut current) = self.inner.connect_delay.write() {
            *current = delay;
        }
    }

    /// Make the next connects fail with the given errors, in order
    pub fn fail_next_connects<I>(&self, errors: I)
    where
        I: IntoIterator<Item = ConnectionError>,
    {
        if let Ok(mut scripted) = self.inner.scripted_failures.lock() {
            scripted.extend(errors);
        }
    }

    /// Make every map operation fail with a transport error
    pub fn set_fail_operations(&self, fail: bool) {
        self.inner.fail_operations.store(fail, Ordering::SeqCst);
    }

    /// Make every map operation fail as if the member went away
    pub fn set_connection_lost(&self, lost: bool) {
        self.inner.connection_lost.store(lost, Ordering::SeqCst);
    }

    /// Number of connect calls received so far
    pub fn connect_calls(&self) -> u32 {
        self.inner.connect_calls.load(Ordering::SeqCst)
    }

    /// Read a stored value directly, bypassing any connector
    pub async fn peek(&self, map_name: &str, key: &str) -> Option<Value> {
        let maps = self.inner.maps.read().await;
        maps.get(map_name).and_then(|map| map.get(key)).cloned()
    }

    fn is_member(&self, host: &str) -> bool {
        self.inner
            .members
            .read()
            .map(|members| members.contains(host))
            .unwrap_or(false)
    }

    fn connect_delay(&self) -> Duration {
        self.inner
            .connect_delay
            .read()
            .map(|delay| *delay)
            .unwrap_or(Duration::ZERO)
    }

    fn next_scripted_failure(&self) -> Option<ConnectionError> {
        self.inner
            .scripted_failures
            .lock()
            .ok()
            .and_then(|mut scripted| scripted.pop_front())
    }
}

#[async_trait]
impl GridClient for MemoryGrid {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn default_port(&self) -> u16 {
        MEMORY_DEFAULT_PORT
    }

    async fn connect(
        &self,
        address: &GridAddress,
        map_name: &str,
    ) -> ConnectionResult<Arc<dyn GridMap>> {
        self.inner.connect_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.connect_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_scripted_failure() {
            return Err(error);
        }

        if !self.is_member(&address.host) {
            return Err(ConnectionError::Refused {
                address: address.authority(MEMORY_DEFAULT_PORT),
                reason: "no grid member at this address".to_string(),
            });
        }

        debug!("Memory grid connection opened for map {}", map_name);
        Ok(Arc::new(MemoryMap {
            grid: self.clone(),
            map_name: map_name.to_string(),
        }))
    }
}

/// Map handle returned by [`MemoryGrid`]
struct MemoryMap {
    grid: MemoryGrid,
    map_name: String,
}

impl MemoryMap {
    fn check_faults(&self) -> OperationResult<()> {
        if self.grid.inner.connection_lost.load(Ordering::SeqCst) {
            return Err(OperationError::ConnectionLost(
                "memory grid member is gone".to_string(),
            ));
        }
        if self.grid.inner.fail_operations.load(Ordering::SeqCst) {
            return Err(OperationError::Transport(
                "memory grid operation failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GridMap for MemoryMap {
    async fn get(&self, key: &str) -> OperationResult<Option<Value>> {
        self.check_faults()?;
        let maps = self.grid.inner.maps.read().await;
        Ok(maps.get(&self.map_name).and_then(|map| map.get(key)).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> OperationResult<()> {
        self.check_faults()?;
        let mut maps = self.grid.inner.maps.write().await;
        maps.entry(self.map_name.clone())
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> OperationResult<bool> {
        self.check_faults()?;
        let mut maps = self.grid.inner.maps.write().await;
        Ok(maps
            .get_mut(&self.map_name)
            .map(|map| map.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn ping(&self) -> OperationResult<()> {
        self.check_faults()
    }
}
