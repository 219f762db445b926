pub mod validation;

pub use validation::validate;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::grid::GridAddress;

pub const DEFAULT_CONNECTION_ATTEMPT_LIMIT: u32 = 2;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5000;

/// Connector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    /// Name of the remote map the connector binds to
    pub map_name: String,
    /// Transport settings
    pub network_config: NetworkConfig,
    /// Upper bound on one grid call, in milliseconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout: u64,
}

/// Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Cluster members, tried in order
    pub addresses: Vec<String>,
    /// Maximum number of connection attempts
    pub connection_attempt_limit: u32,
    /// Timeout of a single connection attempt, in milliseconds
    pub connection_timeout: u64,
    /// Pause between connection attempts, in milliseconds
    #[serde(default)]
    pub connection_attempt_period: u64,
}

fn default_operation_timeout() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

impl ConnectorConfig {
    /// Config with default network settings for the given map and members
    pub fn new<I, S>(map_name: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            map_name: map_name.into(),
            network_config: NetworkConfig {
                addresses: addresses.into_iter().map(Into::into).collect(),
                connection_attempt_limit: DEFAULT_CONNECTION_ATTEMPT_LIMIT,
                connection_timeout: DEFAULT_CONNECTION_TIMEOUT_MS,
                connection_attempt_period: 0,
            },
            operation_timeout: DEFAULT_OPERATION_TIMEOUT_MS,
        }
    }

    /// Validate an untyped configuration value
    pub fn from_value(value: &serde_json::Value) -> ConfigResult<Self> {
        validate(value)
    }

    /// Parse and validate a YAML (or JSON) document
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value: serde_json::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        validate(&value)
    }

    /// Load, parse and validate a YAML (or JSON) file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    /// Apply the validation rules to a typed configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.map_name.trim().is_empty() {
            return Err(ConfigError::invalid("mapName", "must not be empty"));
        }
        if self.operation_timeout == 0 {
            return Err(ConfigError::NonPositive("operationTimeout".to_string()));
        }
        self.network_config.validate()
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout)
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.connection_attempt_limit == 0 {
            return Err(ConfigError::NonPositive(
                "networkConfig.connectionAttemptLimit".to_string(),
            ));
        }
        if self.connection_timeout == 0 {
            return Err(ConfigError::NonPositive(
                "networkConfig.connectionTimeout".to_string(),
            ));
        }
        self.parse_addresses().map(|_| ())
    }

    /// Parse every configured address, preserving order
    pub fn parse_addresses(&self) -> ConfigResult<Vec<GridAddress>> {
        if self.addresses.is_empty() {
            return Err(ConfigError::invalid(
                "networkConfig.addresses",
                "must contain at least one address",
            ));
        }
        self.addresses
            .iter()
            .map(|address| GridAddress::parse(address))
            .collect()
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout)
    }

    pub fn connection_attempt_period(&self) -> Duration {
        Duration::from_millis(self.connection_attempt_period)
    }
}
