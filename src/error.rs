use std::time::Duration;
use thiserror::Error;

use crate::types::ConnectorState;

/// Errors raised while validating connector configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Configuration must be an object, got {0}")]
    NotAnObject(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field {field} is invalid: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Field {0} must be greater than 0")]
    NonPositive(String),

    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to read configuration file: {0}")]
    Io(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while establishing or holding the grid connection
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Connection to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("Connection to {address} refused: {reason}")]
    Refused { address: String, reason: String },

    #[error("Connection to {address} rejected: {reason}")]
    Rejected { address: String, reason: String },

    #[error("Gave up after {attempts} connection attempt(s), last error: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ConnectionError>,
    },

    #[error("Connection lost: {0}")]
    Lost(String),
}

impl ConnectionError {
    /// Check if another connection attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectionError::Timeout { .. }
                | ConnectionError::Refused { .. }
                | ConnectionError::Lost(_)
        )
    }
}

/// Errors returned by `get`, `set` and `delete`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperationError {
    #[error("Connector is not ready (state: {0})")]
    NotReady(ConnectorState),

    #[error("Grid transport error: {0}")]
    Transport(String),

    #[error("Grid connection lost: {0}")]
    ConnectionLost(String),

    #[error("Operation timeout after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OperationError {
    /// Check if the fault means the live grid connection went away
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, OperationError::ConnectionLost(_))
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(e: serde_json::Error) -> Self {
        OperationError::Serialization(e.to_string())
    }
}

/// Payload of an `Error` lifecycle notification
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConnectorFault {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ConnectionResult<T> = Result<T, ConnectionError>;
pub type OperationResult<T> = Result<T, OperationError>;
