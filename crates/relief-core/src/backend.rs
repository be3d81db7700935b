//! Store handle shared by every coordination component.
//!
//! Built once at startup and cloned into each component constructor.
//! Dispatches to `PostgreSQL` or the in-process tables with a plain enum
//! match, so no trait objects or boxed futures are involved.

use chrono::{DateTime, Utc};
use relief_db::{CacheEntry, DbError, MemoryStore, PostgresPool};
use relief_types::{
    AuditEntry, GeoPoint, Incident, IncidentDraft, IncidentFilter, IncidentId, IncidentPatch,
    Resource, ResourceDraft,
};

/// Backing store for incidents, resources and cache rows.
#[derive(Debug, Clone)]
pub enum StoreHandle {
    /// `PostgreSQL` with `PostGIS`.
    Postgres(PostgresPool),
    /// In-process tables.
    Memory(MemoryStore),
}

impl StoreHandle {
    /// A fresh, empty in-process store.
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    /// Backend name for logs and the status endpoint.
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Confirm the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be reached.
    pub async fn ping(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => pg.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }

    // =========================================================================
    // Incidents
    // =========================================================================

    pub(crate) async fn insert_incident(&self, draft: &IncidentDraft) -> Result<Incident, DbError> {
        match self {
            Self::Postgres(pg) => pg.incidents().insert(draft).await,
            Self::Memory(mem) => Ok(mem.insert_incident(draft).await),
        }
    }

    pub(crate) async fn select_incidents(
        &self,
        filter: &IncidentFilter,
    ) -> Result<Vec<Incident>, DbError> {
        match self {
            Self::Postgres(pg) => pg.incidents().select(filter).await,
            Self::Memory(mem) => Ok(mem.select_incidents(filter).await),
        }
    }

    pub(crate) async fn incident_exists(&self, id: IncidentId) -> Result<bool, DbError> {
        match self {
            Self::Postgres(pg) => pg.incidents().exists(id).await,
            Self::Memory(mem) => Ok(mem.incident_exists(id).await),
        }
    }

    pub(crate) async fn update_incident(
        &self,
        id: IncidentId,
        patch: &IncidentPatch,
        entry: &AuditEntry,
    ) -> Result<Option<Incident>, DbError> {
        match self {
            Self::Postgres(pg) => pg.incidents().update(id, patch, entry).await,
            Self::Memory(mem) => Ok(mem.update_incident(id, patch, entry).await),
        }
    }

    pub(crate) async fn append_audit(
        &self,
        id: IncidentId,
        entry: &AuditEntry,
    ) -> Result<bool, DbError> {
        match self {
            Self::Postgres(pg) => pg.incidents().append_audit(id, entry).await,
            Self::Memory(mem) => Ok(mem.append_audit(id, entry).await),
        }
    }

    pub(crate) async fn delete_incident(&self, id: IncidentId) -> Result<bool, DbError> {
        match self {
            Self::Postgres(pg) => pg.incidents().delete(id).await,
            Self::Memory(mem) => Ok(mem.delete_incident(id).await),
        }
    }

    // =========================================================================
    // Resources
    // =========================================================================

    pub(crate) async fn insert_resource(&self, draft: &ResourceDraft) -> Result<Resource, DbError> {
        match self {
            Self::Postgres(pg) => pg.resources().insert(draft).await,
            Self::Memory(mem) => mem.insert_resource(draft).await,
        }
    }

    pub(crate) async fn resources_within(
        &self,
        center: &GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<Resource>, DbError> {
        match self {
            Self::Postgres(pg) => pg.resources().within(center, radius_m).await,
            Self::Memory(mem) => Ok(mem.resources_within(center, radius_m).await),
        }
    }

    // =========================================================================
    // Cache rows
    // =========================================================================

    pub(crate) async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>, DbError> {
        match self {
            Self::Postgres(pg) => pg.cache().get(key).await,
            Self::Memory(mem) => mem.cache_get(key).await,
        }
    }

    pub(crate) async fn cache_upsert(&self, entry: &CacheEntry) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => pg.cache().upsert(entry).await,
            Self::Memory(mem) => mem.cache_upsert(entry).await,
        }
    }

    pub(crate) async fn cache_delete_prefix(&self, prefix: &str) -> Result<u64, DbError> {
        match self {
            Self::Postgres(pg) => pg.cache().delete_prefix(prefix).await,
            Self::Memory(mem) => mem.cache_delete_prefix(prefix).await,
        }
    }

    pub(crate) async fn cache_delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        match self {
            Self::Postgres(pg) => pg.cache().delete_expired(now).await,
            Self::Memory(mem) => mem.cache_delete_expired(now).await,
        }
    }
}
