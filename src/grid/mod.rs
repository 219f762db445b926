//! Grid client seam.
//!
//! The connector never talks to a network directly. It asks a [`GridClient`]
//! for a connection to one cluster address, and receives a [`GridMap`] bound
//! to the configured map name. Everything below that line (membership,
//! partitioning, transport, wire encoding) belongs to the grid client.

pub mod memory;
pub mod redis;

pub use memory::MemoryGrid;
pub use self::redis::{RedisGrid, RedisGridOptions};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult, ConnectionResult, OperationResult};

/// A client library able to reach a distributed in-memory data grid
#[async_trait]
pub trait GridClient: Send + Sync {
    /// Product name of the grid backend
    fn backend_name(&self) -> &'static str;

    /// Port used when an address does not carry one
    fn default_port(&self) -> u16;

    /// Open a connection to one cluster member and bind it to `map_name`.
    ///
    /// Implementations should not enforce their own connect timeout; the
    /// supervisor bounds every call.
    async fn connect(
        &self,
        address: &GridAddress,
        map_name: &str,
    ) -> ConnectionResult<Arc<dyn GridMap>>;
}

/// Handle to one named map on a connected grid
#[async_trait]
pub trait GridMap: Send + Sync {
    /// Look up a key. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> OperationResult<Option<Value>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: &Value) -> OperationResult<()>;

    /// Remove a key. Returns whether a value was present.
    async fn delete(&self, key: &str) -> OperationResult<bool>;

    /// Round trip to the cluster member
    async fn ping(&self) -> OperationResult<()>;
}

/// Cluster member address, `host` or `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl GridAddress {
    /// Parse `host`, `host:port`, `[v6]`, `[v6]:port` or a bare IPv6 literal
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| ConfigError::InvalidAddress {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("address is empty"));
        }

        let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
            let end = rest.find(']').ok_or_else(|| invalid("unterminated '['"))?;
            let host = &rest[..end];
            let tail = &rest[end + 1..];
            let port = match tail {
                "" => None,
                _ => Some(
                    tail.strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected characters after ']'"))?,
                ),
            };
            (host, port)
        } else if raw.matches(':').count() == 1 {
            let (host, port) = raw.split_once(':').ok_or_else(|| invalid("malformed"))?;
            (host, Some(port))
        } else {
            (raw, None)
        };

        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(invalid("host contains whitespace"));
        }

        let port = match port {
            None => None,
            Some(port) => match port.parse::<u16>() {
                Ok(0) | Err(_) => return Err(invalid("port must be between 1 and 65535")),
                Ok(port) => Some(port),
            },
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn port_or(&self, default_port: u16) -> u16 {
        self.port.unwrap_or(default_port)
    }

    /// `host:port` with IPv6 hosts bracketed
    pub fn authority(&self, default_port: u16) -> String {
        let port = self.port_or(default_port);
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, port)
        } else {
            format!("{}:{}", self.host, port)
        }
    }
}

impl fmt::Display for GridAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.port, self.host.contains(':')) {
            (Some(port), true) => write!(f, "[{}]:{}", self.host, port),
            (Some(port), false) => write!(f, "{}:{}", self.host, port),
            (None, _) => f.write_str(&self.host),
        }
    }
}
