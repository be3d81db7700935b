//! Request-level coordination: cache, store, audit, invalidation, broadcast.
//!
//! Reads go cache-first. Mutations validate, write through the entity
//! store with an audit entry, drop the cache namespaces the write made
//! stale, log an action record, and publish exactly one event. A failed
//! mutation publishes nothing.

use core::future::Future;

use relief_types::{
    AuditAction, EntityKind, EventName, GeoPoint, Incident, IncidentFilter, IncidentId,
    IncidentPatch, NewIncident, NewResource, Resource,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::audit::AuditRecorder;
use crate::backend::StoreHandle;
use crate::broadcast::{Broadcaster, EventFilter, Subscription};
use crate::cache::{Cached, TtlCache};
use crate::cache_key::CacheKey;
use crate::clock::Clock;
use crate::config::ReliefConfig;
use crate::entity::EntityStore;
use crate::error::CoreError;
use crate::proximity::ProximityEngine;

/// The coordination layer as one cloneable handle.
#[derive(Debug, Clone)]
pub struct ReliefService {
    store: StoreHandle,
    entities: EntityStore,
    cache: TtlCache,
    proximity: ProximityEngine,
    broadcaster: Broadcaster,
    audit: AuditRecorder,
}

impl ReliefService {
    /// Wire every component to `store`, stamping time from `clock`.
    pub fn new(store: StoreHandle, clock: Clock, config: &ReliefConfig) -> Self {
        let cache = TtlCache::new(store.clone(), clock.clone(), config.cache.ttl());
        let proximity = ProximityEngine::new(
            store.clone(),
            cache.clone(),
            config.proximity.default_radius_m,
        );
        Self {
            entities: EntityStore::new(store.clone()),
            broadcaster: Broadcaster::new(config.broadcast.capacity, clock.clone()),
            audit: AuditRecorder::new(clock),
            store,
            cache,
            proximity,
        }
    }

    /// The backing store.
    pub const fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// The TTL cache.
    pub const fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// The proximity engine.
    pub const fn proximity(&self) -> &ProximityEngine {
        &self.proximity
    }

    /// The broadcast channel.
    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Register a broadcast subscriber.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.broadcaster.subscribe(filter)
    }

    // =========================================================================
    // Incidents
    // =========================================================================

    /// Create an incident on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for missing or malformed fields.
    pub async fn create_incident(
        &self,
        actor: &str,
        fields: NewIncident,
    ) -> Result<Incident, CoreError> {
        let entry = self.audit.entry(AuditAction::Create, actor);
        let incident = self.entities.create_incident(fields, Some(entry)).await?;

        self.cache.invalidate_prefix(CacheKey::INCIDENTS_PREFIX).await;
        tracing::info!(
            action = "incident_created",
            id = %incident.id,
            actor,
            title = %incident.title,
            "Action recorded"
        );
        self.publish_incident(incident.id, AuditAction::Create, to_payload(&incident));
        Ok(incident)
    }

    /// Incidents matching `filter`, cache-first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the store query fails on a miss.
    pub async fn list_incidents(
        &self,
        filter: &IncidentFilter,
    ) -> Result<Cached<Vec<Incident>>, CoreError> {
        let key = CacheKey::incidents(filter);
        let entities = &self.entities;
        self.cache
            .fetch_through(key.as_str(), move || async move {
                entities.get_incidents(filter).await
            })
            .await
    }

    /// Apply `patch` to incident `id` on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for malformed fields or
    /// [`CoreError::NotFound`] if no incident has `id`.
    pub async fn update_incident(
        &self,
        actor: &str,
        id: IncidentId,
        patch: &IncidentPatch,
    ) -> Result<Incident, CoreError> {
        let entry = self.audit.entry(AuditAction::Update, actor);
        let incident = self.entities.update_incident(id, patch, &entry).await?;

        self.cache.invalidate_prefix(CacheKey::INCIDENTS_PREFIX).await;
        tracing::info!(action = "incident_updated", id = %id, actor, "Action recorded");
        self.publish_incident(id, AuditAction::Update, to_payload(&incident));
        Ok(incident)
    }

    /// Delete incident `id` (and its resources) on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no incident has `id`.
    pub async fn delete_incident(&self, actor: &str, id: IncidentId) -> Result<(), CoreError> {
        let entry = self.audit.entry(AuditAction::Delete, actor);
        self.entities.delete_incident(id, &entry).await?;

        self.cache.invalidate_prefix(CacheKey::INCIDENTS_PREFIX).await;
        self.cache.invalidate_prefix(CacheKey::NEARBY_PREFIX).await;
        tracing::info!(action = "incident_deleted", id = %id, actor, "Action recorded");
        self.publish_incident(id, AuditAction::Delete, serde_json::json!({ "id": id }));
        Ok(())
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Create a resource on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for missing fields or
    /// [`CoreError::NotFound`] if the incident does not exist.
    pub async fn create_resource(
        &self,
        actor: &str,
        fields: NewResource,
    ) -> Result<Resource, CoreError> {
        let resource = self.entities.create_resource(fields).await?;

        self.cache.invalidate_prefix(CacheKey::NEARBY_PREFIX).await;
        tracing::info!(
            action = "resource_created",
            id = %resource.id,
            incident_id = %resource.incident_id,
            actor,
            "Action recorded"
        );
        self.broadcaster.publish(
            EventName::ResourcesUpdated,
            EntityKind::Resource,
            resource.id.into_inner(),
            AuditAction::Create,
            to_payload(&resource),
        );
        Ok(resource)
    }

    /// Resources of `incident_id` within `radius_m` (or the default) of
    /// `center`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a bad point or radius.
    pub async fn nearby_resources(
        &self,
        incident_id: IncidentId,
        center: &GeoPoint,
        radius_m: Option<f64>,
    ) -> Result<Cached<Vec<Resource>>, CoreError> {
        self.proximity
            .find_nearby_for_incident(incident_id, center, radius_m)
            .await
    }

    // =========================================================================
    // Feeds and housekeeping
    // =========================================================================

    /// The official-updates feed, cache-first; `fetch` runs on a miss.
    ///
    /// # Errors
    ///
    /// Returns the error of `fetch` on a miss; nothing is cached then.
    pub async fn cached_feed<T, F, Fut>(&self, fetch: F) -> Result<Cached<T>, CoreError>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let key = CacheKey::official_updates();
        let result = self.cache.fetch_through(key.as_str(), fetch).await?;
        let action = if result.cached {
            "feed_cache_hit"
        } else {
            "feed_fetched"
        };
        tracing::info!(action, key = %key, "Action recorded");
        Ok(result)
    }

    /// Remove expired cache rows. Returns the number removed.
    pub async fn sweep_cache(&self) -> u64 {
        let removed = self.cache.sweep_expired().await;
        if removed > 0 {
            tracing::info!(removed, "Swept expired cache entries");
        }
        removed
    }

    fn publish_incident(&self, id: IncidentId, action: AuditAction, payload: serde_json::Value) {
        self.broadcaster.publish(
            EventName::IncidentUpdated,
            EntityKind::Incident,
            id.into_inner(),
            action,
            payload,
        );
    }
}

fn to_payload<T: Serialize>(record: &T) -> serde_json::Value {
    serde_json::to_value(record).unwrap_or_default()
}
