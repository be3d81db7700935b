//! Relief coordination service binary.
//!
//! # Startup Sequence
//!
//! 1. Load `relief-config.yaml` (defaults if absent) and apply
//!    environment overrides
//! 2. Initialize structured logging (tracing)
//! 3. Open the configured store, running migrations for `PostgreSQL`
//! 4. Wire the coordination layer, geocoder and feed source
//! 5. Spawn the cache sweeper
//! 6. Serve HTTP + `WebSocket` until `Ctrl-C`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relief_core::config::LoggingConfig;
use relief_core::{Clock, ReliefConfig};
use relief_server::startup::{build_state, connect_store, spawn_cache_sweeper};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "relief-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ReliefConfig::load_or_default(Path::new(CONFIG_PATH))
        .with_context(|| format!("loading {CONFIG_PATH}"))?;

    init_tracing(&config.logging);
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = ?config.store.backend,
        live_upstreams = config.upstream.live,
        cache_ttl_secs = config.cache.ttl_secs,
        "relief-server starting"
    );

    let store = connect_store(&config.store)
        .await
        .context("opening the store")?;
    info!(backend = store.backend_name(), "Store ready");

    let state = build_state(store, Clock::System, &config).context("wiring the service")?;
    let sweeper = spawn_cache_sweeper(
        state.service.clone(),
        Duration::from_secs(config.cache.sweep_interval_secs),
    );

    let result = relief_server::start_server(&config.server, Arc::new(state)).await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result.context("serving")?;
    info!("relief-server exited cleanly");
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level.
fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
