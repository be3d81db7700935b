//! In-process store with the same observable semantics as `PostgreSQL`.
//!
//! Backs local runs without a database and the coordination test suite.
//! All three tables live behind one [`RwLock`]; every mutation holds the
//! write lock for its whole read-modify-write, which gives the same
//! per-statement atomicity the SQL stores rely on. Radius search uses the
//! haversine distance from [`GeoPoint::distance_m`].
//!
//! With the `fault-injection` feature, [`MemoryStore::fail_cache_ops`]
//! makes every cache-table operation return [`DbError::Unavailable`]
//! while the incident and resource tables keep working.

#[cfg(any(test, feature = "fault-injection"))]
use core::sync::atomic::{AtomicBool, Ordering};
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relief_types::{
    AuditEntry, GeoPoint, Incident, IncidentDraft, IncidentFilter, IncidentId, IncidentPatch,
    Resource, ResourceDraft, ResourceId,
};
use tokio::sync::RwLock;

use crate::cache_store::CacheEntry;
use crate::error::DbError;

#[derive(Debug, Default)]
struct Tables {
    incidents: BTreeMap<IncidentId, Incident>,
    resources: BTreeMap<ResourceId, Resource>,
    cache: BTreeMap<String, CacheEntry>,
}

/// Shared in-memory tables. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    #[cfg(any(test, feature = "fault-injection"))]
    cache_faults: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// While `failing` is set, every cache-table operation errors.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn fail_cache_ops(&self, failing: bool) {
        self.cache_faults.store(failing, Ordering::SeqCst);
    }

    #[cfg(any(test, feature = "fault-injection"))]
    fn check_cache(&self) -> Result<(), DbError> {
        if self.cache_faults.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(String::from("cache table")));
        }
        Ok(())
    }

    // =========================================================================
    // Incidents
    // =========================================================================

    /// Insert a validated incident and return the stored record.
    pub async fn insert_incident(&self, draft: &IncidentDraft) -> Incident {
        let now = Utc::now();
        let incident = Incident {
            id: IncidentId::new(),
            title: draft.title.clone(),
            location_name: draft.location_name.clone(),
            location: draft.location,
            description: draft.description.clone(),
            tags: draft.tags.clone(),
            owner_id: draft.owner_id.clone(),
            audit_trail: draft.audit_trail.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .incidents
            .insert(incident.id, incident.clone());
        incident
    }

    /// Every incident matching `filter`, oldest first.
    pub async fn select_incidents(&self, filter: &IncidentFilter) -> Vec<Incident> {
        let tables = self.tables.read().await;
        let mut matched: Vec<Incident> = tables
            .incidents
            .values()
            .filter(|incident| filter.matches(incident))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matched
    }

    /// Whether an incident with `id` exists.
    pub async fn incident_exists(&self, id: IncidentId) -> bool {
        self.tables.read().await.incidents.contains_key(&id)
    }

    /// Merge `patch` and append `entry` under one write lock.
    ///
    /// Returns `None` if no incident has `id`.
    pub async fn update_incident(
        &self,
        id: IncidentId,
        patch: &IncidentPatch,
        entry: &AuditEntry,
    ) -> Option<Incident> {
        let mut tables = self.tables.write().await;
        let incident = tables.incidents.get_mut(&id)?;
        patch.apply_to(incident);
        incident.audit_trail.push(entry.clone());
        incident.updated_at = Utc::now();
        Some(incident.clone())
    }

    /// Append `entry` to the trail. Returns `false` if no incident has `id`.
    pub async fn append_audit(&self, id: IncidentId, entry: &AuditEntry) -> bool {
        let mut tables = self.tables.write().await;
        tables.incidents.get_mut(&id).is_some_and(|incident| {
            incident.audit_trail.push(entry.clone());
            incident.updated_at = Utc::now();
            true
        })
    }

    /// Delete the incident and cascade to its resources.
    ///
    /// Returns `false` if no incident has `id`.
    pub async fn delete_incident(&self, id: IncidentId) -> bool {
        let mut tables = self.tables.write().await;
        if tables.incidents.remove(&id).is_none() {
            return false;
        }
        tables.resources.retain(|_, resource| resource.incident_id != id);
        true
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Insert a validated resource.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingReference`] if the incident does not exist.
    pub async fn insert_resource(&self, draft: &ResourceDraft) -> Result<Resource, DbError> {
        let mut tables = self.tables.write().await;
        if !tables.incidents.contains_key(&draft.incident_id) {
            return Err(DbError::MissingReference(format!(
                "incident {}",
                draft.incident_id
            )));
        }
        let resource = Resource {
            id: ResourceId::new(),
            incident_id: draft.incident_id,
            name: draft.name.clone(),
            location_name: draft.location_name.clone(),
            location: draft.location,
            kind: draft.kind.clone(),
            created_at: Utc::now(),
        };
        tables.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    /// Every resource within `radius_m` metres of `center`, nearest first.
    pub async fn resources_within(&self, center: &GeoPoint, radius_m: f64) -> Vec<Resource> {
        let tables = self.tables.read().await;
        let mut hits: Vec<(f64, Resource)> = tables
            .resources
            .values()
            .filter_map(|resource| {
                let distance = center.distance_m(&resource.location);
                (distance <= radius_m).then(|| (distance, resource.clone()))
            })
            .collect();
        hits.sort_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)));
        hits.into_iter().map(|(_, resource)| resource).collect()
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Read the row for `key`, expired or not.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] while cache faults are injected.
    pub async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>, DbError> {
        #[cfg(any(test, feature = "fault-injection"))]
        self.check_cache()?;
        Ok(self.tables.read().await.cache.get(key).cloned())
    }

    /// Insert or fully replace the row for `entry.key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] while cache faults are injected.
    pub async fn cache_upsert(&self, entry: &CacheEntry) -> Result<(), DbError> {
        #[cfg(any(test, feature = "fault-injection"))]
        self.check_cache()?;
        self.tables
            .write()
            .await
            .cache
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    /// Delete every row whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] while cache faults are injected.
    pub async fn cache_delete_prefix(&self, prefix: &str) -> Result<u64, DbError> {
        #[cfg(any(test, feature = "fault-injection"))]
        self.check_cache()?;
        let mut tables = self.tables.write().await;
        let before = tables.cache.len();
        tables.cache.retain(|key, _| !key.starts_with(prefix));
        Ok(count_removed(before, tables.cache.len()))
    }

    /// Delete every row that is expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] while cache faults are injected.
    pub async fn cache_delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        #[cfg(any(test, feature = "fault-injection"))]
        self.check_cache()?;
        let mut tables = self.tables.write().await;
        let before = tables.cache.len();
        tables.cache.retain(|_, entry| entry.is_live_at(now));
        Ok(count_removed(before, tables.cache.len()))
    }

    /// Number of cache rows, live or expired.
    pub async fn cache_len(&self) -> usize {
        self.tables.read().await.cache.len()
    }
}

fn count_removed(before: usize, after: usize) -> u64 {
    u64::try_from(before.saturating_sub(after)).unwrap_or(u64::MAX)
}
