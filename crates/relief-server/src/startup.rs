//! Startup wiring.
//!
//! [`connect_store`] opens the configured backend, [`build_state`] wires
//! the coordination layer and upstream collaborators around it, and
//! [`spawn_cache_sweeper`] starts the periodic expired-row sweep on a
//! background task.

use std::time::Duration;

use relief_core::config::{StoreConfig, UpstreamConfig};
use relief_core::{Clock, ReliefConfig, ReliefService, StoreBackend, StoreHandle};
use relief_db::{DbError, PostgresConfig, PostgresPool};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::UpstreamError;
use crate::feeds::FeedSource;
use crate::geocode::Geocoder;
use crate::state::AppState;

/// Errors that can occur while assembling the service.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The store could not be opened or migrated.
    #[error("store startup failed: {0}")]
    Store(#[from] DbError),

    /// An upstream client could not be constructed.
    #[error("upstream client setup failed: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Open the backend named by `config.backend`, running migrations when
/// configured.
///
/// # Errors
///
/// Returns [`StartupError::Store`] if `PostgreSQL` is unreachable or a
/// migration fails.
pub async fn connect_store(config: &StoreConfig) -> Result<StoreHandle, StartupError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-process store; nothing survives a restart");
            Ok(StoreHandle::memory())
        }
        StoreBackend::Postgres => {
            let pg_config = PostgresConfig::new(&config.postgres_url)
                .with_max_connections(config.max_connections)
                .with_connect_timeout(Duration::from_secs(config.connect_timeout_secs));
            let pool = PostgresPool::connect(&pg_config).await?;
            if config.run_migrations {
                pool.run_migrations().await?;
            }
            Ok(StoreHandle::Postgres(pool))
        }
    }
}

/// Wire the service, geocoder and feed source around `store`.
///
/// # Errors
///
/// Returns [`StartupError::Upstream`] if an upstream client cannot be
/// built from `config.upstream`.
pub fn build_state(
    store: StoreHandle,
    clock: Clock,
    config: &ReliefConfig,
) -> Result<AppState, StartupError> {
    let (geocoder, feeds) = upstreams(&config.upstream)?;
    let service = ReliefService::new(store, clock, config);
    Ok(AppState::new(service, geocoder, feeds))
}

fn upstreams(config: &UpstreamConfig) -> Result<(Geocoder, FeedSource), StartupError> {
    if !config.live {
        tracing::info!("Upstreams offline; using the static gazetteer and feed payload");
    }
    Ok((Geocoder::from_config(config)?, FeedSource::from_config(config)?))
}

/// Sweep expired cache rows every `every`. Returns `None` (and spawns
/// nothing) when `every` is zero.
pub fn spawn_cache_sweeper(service: ReliefService, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::info!("Cache sweep disabled");
        return None;
    }

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            service.sweep_cache().await;
        }
    });

    tracing::info!(interval_secs = every.as_secs(), "Cache sweeper spawned on background task");
    Some(handle)
}

#[cfg(test)]
mod tests {
    use relief_db::MemoryStore;

    use super::*;

    fn offline_config() -> ReliefConfig {
        let mut config = ReliefConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.upstream.live = false;
        config
    }

    #[tokio::test]
    async fn memory_backend_needs_no_database() {
        let store = connect_store(&offline_config().store).await.ok();
        assert_eq!(store.map(|s| s.backend_name()), Some("memory"));
    }

    #[tokio::test]
    async fn offline_state_uses_static_upstreams() {
        let config = offline_config();
        let state = build_state(StoreHandle::memory(), Clock::default(), &config).ok();
        assert!(matches!(
            state.as_ref().map(|s| &s.geocoder),
            Some(Geocoder::Static(_))
        ));
        assert!(matches!(
            state.as_ref().map(|s| &s.feeds),
            Some(FeedSource::Static(_))
        ));
    }

    #[test]
    fn zero_interval_spawns_nothing() {
        let service = ReliefService::new(StoreHandle::memory(), Clock::default(), &offline_config());
        assert!(spawn_cache_sweeper(service, Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_rows_each_interval() {
        let start = chrono::Utc::now();
        let clock = Clock::manual(start);
        let store = MemoryStore::new();
        let service = ReliefService::new(
            StoreHandle::Memory(store.clone()),
            clock.clone(),
            &offline_config(),
        );
        let cache = service.cache();
        cache.set("stale", serde_json::json!(1), start).await;
        cache.put("live", &2).await;
        clock.advance(chrono::Duration::seconds(1));

        let every = Duration::from_secs(300);
        let handle = spawn_cache_sweeper(service, every);
        assert!(handle.is_some());
        assert_eq!(store.cache_len().await, 2);

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(store.cache_len().await, 1);

        clock.advance(chrono::Duration::hours(2));
        tokio::time::sleep(every).await;
        assert_eq!(store.cache_len().await, 0);

        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
