use anyhow::{bail, Context};
use dotenv::dotenv;
use grid_cache_connector::grid::{RedisGrid, RedisGridOptions};
use grid_cache_connector::{ConnectorConfig, GridCacheConnector, LifecycleEvent};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "grid-cache.yaml";
const PROBE_KEY: &str = "__grid_cache_probe__";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("GRID_CACHE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = ConnectorConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load connector configuration from {}", config_path))?;

    let options = RedisGridOptions {
        username: std::env::var("GRID_CACHE_USERNAME").ok(),
        password: std::env::var("GRID_CACHE_PASSWORD").ok(),
        tls: std::env::var("GRID_CACHE_TLS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        ..Default::default()
    };

    let connector = GridCacheConnector::from_config(config, Arc::new(RedisGrid::new(options)))?;
    let mut events = connector.subscribe();

    match events.recv().await {
        Some(LifecycleEvent::Ready) => info!("Grid connection ready"),
        Some(LifecycleEvent::Error(fault)) => {
            error!("Grid connection failed: {}", fault);
            bail!("grid connection failed: {}", fault);
        }
        None => bail!("connector stopped before reporting readiness"),
    }

    let probe = json!({ "probe": connector.instance_id().to_string() });

    connector.set(PROBE_KEY, probe.clone()).await?;
    let stored = connector.get(PROBE_KEY).await?;
    if stored.as_ref() != Some(&probe) {
        bail!("probe value mismatch: stored {:?}", stored);
    }
    connector.delete(PROBE_KEY).await?;
    if connector.get(PROBE_KEY).await?.is_some() {
        bail!("probe value still present after delete");
    }

    info!(
        "Probe round trip succeeded on map {} ({:?})",
        connector.config().map_name,
        connector.health_check().await
    );
    Ok(())
}
