use async_trait::async_trait;
use serde_json::Value;

use crate::error::OperationResult;
use crate::types::Capability;

/// Storage contract a pub/sub server expects from a cache backend
#[async_trait]
pub trait CacheConnector: Send + Sync {
    /// Name of the connector implementation
    fn name(&self) -> &str;

    /// Semantic version of the connector
    fn version(&self) -> &str;

    /// Product name of the backing store
    fn backend_name(&self) -> &str;

    /// Whether the connector accepts operations
    fn is_ready(&self) -> bool;

    /// Check if the connector supports a capability
    fn supports(&self, capability: Capability) -> bool;

    /// Get a value by key. `Ok(None)` for a missing key.
    async fn get(&self, key: &str) -> OperationResult<Option<Value>>;

    /// Set a value, overwriting any previous one
    async fn set(&self, key: &str, value: Value) -> OperationResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> OperationResult<()>;
}
