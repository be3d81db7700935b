//! TTL cache over the store's `cache` table.
//!
//! Values are JSON. An entry is a hit only while `now < expires_at`;
//! expired rows stay in the table until overwritten or swept. Writes
//! upsert unconditionally, so concurrent writers resolve last-writer-wins.
//!
//! The cache never fails its caller: store and codec faults are logged at
//! `warn` and treated as a miss (reads) or a no-op (writes).

use core::future::Future;

use chrono::{DateTime, Duration, Utc};
use relief_db::CacheEntry;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::StoreHandle;
use crate::clock::Clock;
use crate::error::{CacheFault, CoreError};

/// Lifetime used when the configured TTL cannot be represented.
const FALLBACK_TTL_SECS: i64 = 3600;

/// A value together with whether it was served from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cached<T> {
    /// The value.
    pub value: T,
    /// `true` if served from a live cache entry, `false` if freshly fetched.
    pub cached: bool,
}

/// Store-backed TTL cache.
#[derive(Debug, Clone)]
pub struct TtlCache {
    store: StoreHandle,
    clock: Clock,
    ttl: Duration,
}

impl TtlCache {
    /// Create a cache writing entries that live for `ttl`.
    pub fn new(store: StoreHandle, clock: Clock, ttl: core::time::Duration) -> Self {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(FALLBACK_TTL_SECS));
        Self { store, clock, ttl }
    }

    /// Lifetime of newly written entries.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The value under `key` if a live entry exists.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        match self.store.cache_get(key).await {
            Ok(Some(entry)) if entry.is_live_at(self.clock.now()) => Some(entry.value),
            Ok(_) => None,
            Err(e) => {
                log_fault("read", key, &CacheFault::from(e));
                None
            }
        }
    }

    /// The live value under `key`, decoded as `T`. A value that does not
    /// decode is a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value)
            .map_err(|e| log_fault("decode", key, &CacheFault::from(e)))
            .ok()
    }

    /// Write `value` under `key`, expiring at `expires_at`.
    pub async fn set(&self, key: &str, value: serde_json::Value, expires_at: DateTime<Utc>) {
        let entry = CacheEntry {
            key: key.to_owned(),
            value,
            expires_at,
        };
        if let Err(e) = self.store.cache_upsert(&entry).await {
            log_fault("write", key, &CacheFault::from(e));
        }
    }

    /// Write `value` under `key` with the configured TTL.
    pub async fn put<T: Serialize + Sync>(&self, key: &str, value: &T) {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                log_fault("encode", key, &CacheFault::from(e));
                return;
            }
        };
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(now);
        self.set(key, encoded, expires_at).await;
    }

    /// Serve `key` from the cache, or run `fetch`, cache its result and
    /// return it.
    ///
    /// A failed `fetch` is returned unchanged and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns on failure.
    pub async fn fetch_through<T, F, Fut>(&self, key: &str, fetch: F) -> Result<Cached<T>, CoreError>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if let Some(value) = self.get_as::<T>(key).await {
            tracing::debug!(key, "Cache hit");
            return Ok(Cached {
                value,
                cached: true,
            });
        }
        let value = fetch().await?;
        self.put(key, &value).await;
        Ok(Cached {
            value,
            cached: false,
        })
    }

    /// Drop every entry whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        match self.store.cache_delete_prefix(prefix).await {
            Ok(removed) => tracing::debug!(prefix, removed, "Invalidated cache namespace"),
            Err(e) => log_fault("invalidate", prefix, &CacheFault::from(e)),
        }
    }

    /// Delete every expired row. Returns the number removed.
    pub async fn sweep_expired(&self) -> u64 {
        match self.store.cache_delete_expired(self.clock.now()).await {
            Ok(removed) => removed,
            Err(e) => {
                log_fault("sweep", "*", &CacheFault::from(e));
                0
            }
        }
    }
}

fn log_fault(op: &str, key: &str, fault: &CacheFault) {
    tracing::warn!(op, key, error = %fault, "Cache fault ignored");
}
