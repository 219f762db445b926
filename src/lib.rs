//! Grid cache connector - a cache/storage connector for pub/sub servers
//! backed by a distributed in-memory data grid.
//!
//! The connector validates its configuration, supervises the connection to
//! the grid with a bounded number of attempts and mediates `get`, `set` and
//! `delete` calls once the connection is ready.

pub mod config;
pub mod connector;
pub mod error;
pub mod grid;
pub mod traits;
pub mod types;

pub use config::{ConnectorConfig, NetworkConfig};
pub use connector::{GridCacheConnector, LifecycleEvent, LifecycleSubscription};
pub use error::{ConfigError, ConnectionError, ConnectorFault, OperationError};
pub use grid::{GridAddress, GridClient, GridMap, MemoryGrid, RedisGrid, RedisGridOptions};
pub use traits::CacheConnector;
pub use types::{Capability, ConnectorState, ConnectorStats, HealthStatus};

/// Connector implementation name
pub const CONNECTOR_NAME: &str = env!("CARGO_PKG_NAME");

/// Connector version
pub const CONNECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");
