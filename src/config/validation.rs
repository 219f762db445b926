//! Structural validation of untyped connector configuration.
//!
//! Runs before any connection attempt and has no side effects besides the
//! returned error.

use serde_json::{Map, Value};
use tracing::debug;

use super::{ConnectorConfig, NetworkConfig, DEFAULT_OPERATION_TIMEOUT_MS};
use crate::error::{ConfigError, ConfigResult};
use crate::grid::GridAddress;

/// Check `value` for the minimum required shape and build a typed config
pub fn validate(value: &Value) -> ConfigResult<ConnectorConfig> {
    let root = value
        .as_object()
        .ok_or_else(|| ConfigError::NotAnObject(kind_of(value).to_string()))?;

    let map_name = required_string(root, "mapName", "mapName")?;

    let network = match root.get("networkConfig") {
        None | Some(Value::Null) => {
            return Err(ConfigError::MissingField("networkConfig".to_string()))
        }
        Some(Value::Object(network)) => network,
        Some(other) => {
            return Err(ConfigError::invalid(
                "networkConfig",
                format!("expected an object, got {}", kind_of(other)),
            ))
        }
    };

    let addresses = addresses(network)?;

    let attempt_limit = positive_integer(
        network,
        "connectionAttemptLimit",
        "networkConfig.connectionAttemptLimit",
    )?
    .ok_or_else(|| ConfigError::MissingField("networkConfig.connectionAttemptLimit".to_string()))?;
    let attempt_limit = u32::try_from(attempt_limit).map_err(|_| {
        ConfigError::invalid("networkConfig.connectionAttemptLimit", "value is too large")
    })?;

    let connection_timeout = positive_integer(
        network,
        "connectionTimeout",
        "networkConfig.connectionTimeout",
    )?
    .ok_or_else(|| ConfigError::MissingField("networkConfig.connectionTimeout".to_string()))?;

    let attempt_period = non_negative_integer(
        network,
        "connectionAttemptPeriod",
        "networkConfig.connectionAttemptPeriod",
    )?
    .unwrap_or(0);

    let operation_timeout = positive_integer(root, "operationTimeout", "operationTimeout")?
        .unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS);

    debug!(
        "Validated connector configuration: map={}, addresses={}, attempts={}, timeout={}ms",
        map_name,
        addresses.len(),
        attempt_limit,
        connection_timeout
    );

    Ok(ConnectorConfig {
        map_name,
        network_config: NetworkConfig {
            addresses,
            connection_attempt_limit: attempt_limit,
            connection_timeout,
            connection_attempt_period: attempt_period,
        },
        operation_timeout,
    })
}

fn addresses(network: &Map<String, Value>) -> ConfigResult<Vec<String>> {
    const FIELD: &str = "networkConfig.addresses";

    let items = match network.get("addresses") {
        None | Some(Value::Null) => return Err(ConfigError::MissingField(FIELD.to_string())),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ConfigError::invalid(
                FIELD,
                format!("expected an array, got {}", kind_of(other)),
            ))
        }
    };

    if items.is_empty() {
        return Err(ConfigError::invalid(FIELD, "must contain at least one address"));
    }

    items
        .iter()
        .map(|item| -> ConfigResult<String> {
            let address = item.as_str().ok_or_else(|| {
                ConfigError::invalid(FIELD, format!("expected strings, got {}", kind_of(item)))
            })?;
            GridAddress::parse(address)?;
            Ok(address.trim().to_string())
        })
        .collect()
}

fn required_string(obj: &Map<String, Value>, key: &str, path: &str) -> ConfigResult<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(ConfigError::MissingField(path.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ConfigError::invalid(path, "must not be empty"))
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ConfigError::invalid(
            path,
            format!("expected a string, got {}", kind_of(other)),
        )),
    }
}

enum Integer {
    Absent,
    Negative,
    Value(u64),
}

fn read_integer(obj: &Map<String, Value>, key: &str, path: &str) -> ConfigResult<Integer> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Integer::Absent),
        Some(Value::Number(n)) => match (n.as_u64(), n.as_i64()) {
            (Some(v), _) => Ok(Integer::Value(v)),
            (None, Some(_)) => Ok(Integer::Negative),
            (None, None) => match n.as_f64() {
                Some(v) if v.is_finite() && v.fract() == 0.0 && v < 0.0 => Ok(Integer::Negative),
                Some(v) if v.is_finite() && v.fract() == 0.0 && v < u64::MAX as f64 => {
                    Ok(Integer::Value(v as u64))
                }
                _ => Err(ConfigError::invalid(path, "expected an integer")),
            },
        },
        Some(other) => Err(ConfigError::invalid(
            path,
            format!("expected an integer, got {}", kind_of(other)),
        )),
    }
}

fn positive_integer(obj: &Map<String, Value>, key: &str, path: &str) -> ConfigResult<Option<u64>> {
    match read_integer(obj, key, path)? {
        Integer::Absent => Ok(None),
        Integer::Negative | Integer::Value(0) => Err(ConfigError::NonPositive(path.to_string())),
        Integer::Value(v) => Ok(Some(v)),
    }
}

fn non_negative_integer(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> ConfigResult<Option<u64>> {
    match read_integer(obj, key, path)? {
        Integer::Absent => Ok(None),
        Integer::Negative => Err(ConfigError::invalid(path, "must not be negative")),
        Integer::Value(v) => Ok(Some(v)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Value {
        json!({
            "mapName": "deepstreamCache",
            "networkConfig": {
                "addresses": ["localhost"],
                "connectionAttemptLimit": 1,
                "connectionTimeout": 2000
            }
        })
    }

    #[test]
    fn test_validate_valid_settings() {
        let config = validate(&settings()).unwrap();
        assert_eq!(config.map_name, "deepstreamCache");
        assert_eq!(config.network_config.addresses, vec!["localhost".to_string()]);
        assert_eq!(config.network_config.connection_attempt_limit, 1);
        assert_eq!(config.network_config.connection_timeout, 2000);
        assert_eq!(config.network_config.connection_attempt_period, 0);
        assert_eq!(config.operation_timeout, DEFAULT_OPERATION_TIMEOUT_MS);
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert_eq!(
            validate(&json!("gibberish")),
            Err(ConfigError::NotAnObject("string".to_string()))
        );
        assert!(validate(&json!([1, 2])).is_err());
        assert!(validate(&Value::Null).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_object() {
        assert_eq!(
            validate(&json!({})),
            Err(ConfigError::MissingField("mapName".to_string()))
        );
    }

    #[test]
    fn test_validate_map_name() {
        let mut value = settings();
        value["mapName"] = json!("  ");
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));

        value["mapName"] = json!(42);
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));
    }

    #[test]
    fn test_validate_network_config() {
        let mut value = settings();
        value.as_object_mut().unwrap().remove("networkConfig");
        assert_eq!(
            validate(&value),
            Err(ConfigError::MissingField("networkConfig".to_string()))
        );

        value["networkConfig"] = json!("localhost");
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));
    }

    #[test]
    fn test_validate_addresses() {
        let mut value = settings();
        value["networkConfig"]["addresses"] = json!([]);
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));

        value["networkConfig"]["addresses"] = json!("localhost");
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));

        value["networkConfig"]["addresses"] = json!(["localhost", 7]);
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));

        value["networkConfig"]["addresses"] = json!(["localhost:99999"]);
        assert!(matches!(validate(&value), Err(ConfigError::InvalidAddress { .. })));

        value["networkConfig"].as_object_mut().unwrap().remove("addresses");
        assert_eq!(
            validate(&value),
            Err(ConfigError::MissingField("networkConfig.addresses".to_string()))
        );
    }

    #[test]
    fn test_validate_numeric_fields() {
        let mut value = settings();
        value["networkConfig"]["connectionAttemptLimit"] = json!(0);
        assert_eq!(
            validate(&value),
            Err(ConfigError::NonPositive(
                "networkConfig.connectionAttemptLimit".to_string()
            ))
        );

        value["networkConfig"]["connectionAttemptLimit"] = json!(-3);
        assert_eq!(
            validate(&value),
            Err(ConfigError::NonPositive(
                "networkConfig.connectionAttemptLimit".to_string()
            ))
        );

        value["networkConfig"]["connectionAttemptLimit"] = json!(1.5);
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));

        value["networkConfig"]["connectionAttemptLimit"] = json!(-2.0);
        assert_eq!(
            validate(&value),
            Err(ConfigError::NonPositive(
                "networkConfig.connectionAttemptLimit".to_string()
            ))
        );

        value["networkConfig"]["connectionAttemptLimit"] = json!("2");
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));

        value["networkConfig"]["connectionAttemptLimit"] = json!(2);
        value["networkConfig"].as_object_mut().unwrap().remove("connectionTimeout");
        assert_eq!(
            validate(&value),
            Err(ConfigError::MissingField(
                "networkConfig.connectionTimeout".to_string()
            ))
        );
    }

    #[test]
    fn test_validate_accepts_whole_floats() {
        let mut value = settings();
        value["networkConfig"]["connectionAttemptLimit"] = json!(2.0);
        value["networkConfig"]["connectionTimeout"] = json!(1500.0);
        value["networkConfig"]["connectionAttemptPeriod"] = json!(0.0);

        let config = validate(&value).unwrap();
        assert_eq!(config.network_config.connection_attempt_limit, 2);
        assert_eq!(config.network_config.connection_timeout, 1500);
        assert_eq!(config.network_config.connection_attempt_period, 0);

        value["networkConfig"]["connectionTimeout"] = json!(0.0);
        assert_eq!(
            validate(&value),
            Err(ConfigError::NonPositive(
                "networkConfig.connectionTimeout".to_string()
            ))
        );
    }

    #[test]
    fn test_validate_optional_fields() {
        let mut value = settings();
        value["networkConfig"]["connectionAttemptPeriod"] = json!(0);
        value["operationTimeout"] = json!(750);
        let config = validate(&value).unwrap();
        assert_eq!(config.network_config.connection_attempt_period, 0);
        assert_eq!(config.operation_timeout, 750);

        value["networkConfig"]["connectionAttemptPeriod"] = json!(-1);
        assert!(matches!(validate(&value), Err(ConfigError::InvalidField { .. })));

        value["networkConfig"]["connectionAttemptPeriod"] = json!(10);
        value["operationTimeout"] = json!(0);
        assert_eq!(
            validate(&value),
            Err(ConfigError::NonPositive("operationTimeout".to_string()))
        );
    }
}
