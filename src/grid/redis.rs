use async_trait::async_trait;
use deadpool_redis::{Config, Pool, PoolConfig, PoolError, Runtime};
use redis::{AsyncCommands, ErrorKind, RedisError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ConnectionError, ConnectionResult, OperationError, OperationResult};
use crate::grid::{GridAddress, GridClient, GridMap};

pub const REDIS_DEFAULT_PORT: u16 = 6379;

/// Redis client settings shared by every member connection
#[derive(Debug, Clone)]
pub struct RedisGridOptions {
    /// Connection pool size per member
    pub pool_size: usize,
    /// Database number
    pub database: Option<u32>,
    /// Username for authentication
    pub username: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Enable TLS
    pub tls: bool,
}

impl Default for RedisGridOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            database: None,
            username: None,
            password: None,
            tls: false,
        }
    }
}

/// Redis deployment used as the data grid.
///
/// A map is a Redis hash named after the map; each entry is a hash field
/// holding the JSON text of the value.
#[derive(Debug, Clone, Default)]
pub struct RedisGrid {
    options: RedisGridOptions,
}

impl RedisGrid {
    pub fn new(options: RedisGridOptions) -> Self {
        Self { options }
    }

    /// Connection URL for one member
    pub fn url_for(&self, address: &GridAddress) -> String {
        let scheme = if self.options.tls { "rediss" } else { "redis" };
        let credentials = match (&self.options.username, &self.options.password) {
            (Some(user), Some(password)) => format!(
                "{}:{}@",
                urlencoding::encode(user),
                urlencoding::encode(password)
            ),
            (None, Some(password)) => format!(":{}@", urlencoding::encode(password)),
            (Some(user), None) => format!("{}@", urlencoding::encode(user)),
            (None, None) => String::new(),
        };
        let database = self
            .options
            .database
            .map(|db| format!("/{}", db))
            .unwrap_or_default();

        format!(
            "{}://{}{}{}",
            scheme,
            credentials,
            address.authority(REDIS_DEFAULT_PORT),
            database
        )
    }
}

#[async_trait]
impl GridClient for RedisGrid {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    fn default_port(&self) -> u16 {
        REDIS_DEFAULT_PORT
    }

    async fn connect(
        &self,
        address: &GridAddress,
        map_name: &str,
    ) -> ConnectionResult<Arc<dyn GridMap>> {
        let authority = address.authority(REDIS_DEFAULT_PORT);

        let mut pool_config = Config::from_url(self.url_for(address));
        pool_config.pool = Some(PoolConfig::new(self.options.pool_size.max(1)));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ConnectionError::Rejected {
                address: authority.clone(),
                reason: format!("Failed to create Redis pool: {}", e),
            })?;

        // A pooled connection plus PING proves the member is usable
        let mut conn = pool
            .get()
            .await
            .map_err(|e| pool_connection_error(&authority, e))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_connection_error(&authority, e))?;

        info!("Redis grid member {} connected for map {}", authority, map_name);

        Ok(Arc::new(RedisMap {
            pool,
            map_name: map_name.to_string(),
        }))
    }
}

fn pool_connection_error(address: &str, error: PoolError) -> ConnectionError {
    match error {
        PoolError::Backend(e) => redis_connection_error(address, e),
        other => ConnectionError::Refused {
            address: address.to_string(),
            reason: other.to_string(),
        },
    }
}

fn redis_connection_error(address: &str, error: RedisError) -> ConnectionError {
    match error.kind() {
        ErrorKind::AuthenticationFailed | ErrorKind::InvalidClientConfig => {
            ConnectionError::Rejected {
                address: address.to_string(),
                reason: error.to_string(),
            }
        }
        _ => ConnectionError::Refused {
            address: address.to_string(),
            reason: error.to_string(),
        },
    }
}

fn operation_error(error: RedisError) -> OperationError {
    if error.is_io_error() || error.is_connection_dropped() || error.is_connection_refusal() {
        OperationError::ConnectionLost(error.to_string())
    } else {
        OperationError::Transport(error.to_string())
    }
}

/// Map handle backed by a Redis hash
struct RedisMap {
    pool: Pool,
    map_name: String,
}

impl RedisMap {
    async fn connection(&self) -> OperationResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| match e {
            PoolError::Backend(e) => operation_error(e),
            other => {
                warn!("Redis pool unavailable: {}", other);
                OperationError::ConnectionLost(other.to_string())
            }
        })
    }
}

#[async_trait]
impl GridMap for RedisMap {
    async fn get(&self, key: &str) -> OperationResult<Option<Value>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .hget(&self.map_name, key)
            .await
            .map_err(operation_error)?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> OperationResult<()> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.connection().await?;
        conn.hset::<_, _, _, ()>(&self.map_name, key, payload)
            .await
            .map_err(operation_error)
    }

    async fn delete(&self, key: &str) -> OperationResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .hdel(&self.map_name, key)
            .await
            .map_err(operation_error)?;
        debug!("Redis HDEL {} {} removed {}", self.map_name, key, removed);
        Ok(removed > 0)
    }

    async fn ping(&self) -> OperationResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(operation_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_plain_address() {
        let grid = RedisGrid::default();
        let address = GridAddress::parse("localhost").unwrap();
        assert_eq!(grid.url_for(&address), "redis://localhost:6379");
    }

    #[test]
    fn test_url_for_with_credentials_and_database() {
        let grid = RedisGrid::new(RedisGridOptions {
            username: Some("cache".to_string()),
            password: Some("p@ss word".to_string()),
            database: Some(2),
            tls: true,
            ..Default::default()
        });
        let address = GridAddress::parse("[::1]:7000").unwrap();
        assert_eq!(
            grid.url_for(&address),
            "rediss://cache:p%40ss%20word@[::1]:7000/2"
        );
    }

    #[test]
    fn test_tls_url_opens_a_client() {
        let grid = RedisGrid::new(RedisGridOptions {
            tls: true,
            ..Default::default()
        });
        let address = GridAddress::parse("cache-1.internal").unwrap();
        let url = grid.url_for(&address);
        assert!(url.starts_with("rediss://"));

        let client = redis::Client::open(url.as_str());
        assert!(client.is_ok(), "TLS url rejected: {:?}", client.err());
    }

    #[test]
    fn test_url_for_password_only() {
        let grid = RedisGrid::new(RedisGridOptions {
            password: Some("secret".to_string()),
            ..Default::default()
        });
        let address = GridAddress::parse("cache-1:6380").unwrap();
        assert_eq!(grid.url_for(&address), "redis://:secret@cache-1:6380");
    }

    #[test]
    fn test_authentication_failure_is_not_retryable() {
        let error = RedisError::from((ErrorKind::AuthenticationFailed, "WRONGPASS"));
        let classified = redis_connection_error("localhost:6379", error);
        assert!(matches!(classified, ConnectionError::Rejected { .. }));
        assert!(!classified.is_retryable());
    }

    #[test]
    fn test_io_failure_is_connection_loss() {
        let error = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(operation_error(error).is_connection_loss());

        let error = RedisError::from((ErrorKind::TypeError, "WRONGTYPE"));
        assert!(matches!(operation_error(error), OperationError::Transport(_)));
    }
}
