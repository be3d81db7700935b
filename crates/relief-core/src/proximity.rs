//! Radius search over resource locations.
//!
//! Results are cached per `(lon, lat, radius)` across all incidents; the
//! per-incident view filters the shared result, so one cached radius
//! query serves every incident asking about the same area.

use relief_types::{GeoPoint, IncidentId, Resource};
use validator::Validate;

use crate::backend::StoreHandle;
use crate::cache::{Cached, TtlCache};
use crate::cache_key::CacheKey;
use crate::error::CoreError;

/// Radius used when a query names none, in metres.
pub const DEFAULT_RADIUS_M: f64 = 10_000.0;

/// Cached radius search.
#[derive(Debug, Clone)]
pub struct ProximityEngine {
    store: StoreHandle,
    cache: TtlCache,
    default_radius_m: f64,
}

impl ProximityEngine {
    /// Create an engine answering radius-less queries with `default_radius_m`.
    pub const fn new(store: StoreHandle, cache: TtlCache, default_radius_m: f64) -> Self {
        Self {
            store,
            cache,
            default_radius_m,
        }
    }

    /// Radius applied when a query names none.
    pub const fn default_radius_m(&self) -> f64 {
        self.default_radius_m
    }

    /// Every resource within `radius_m` (or the default) of `center`,
    /// nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an out-of-range point or a
    /// radius that is not finite and positive, or [`CoreError::Store`] if
    /// the search fails.
    pub async fn find_nearby(
        &self,
        center: &GeoPoint,
        radius_m: Option<f64>,
    ) -> Result<Cached<Vec<Resource>>, CoreError> {
        center.validate()?;
        let radius_m = self.resolve_radius(radius_m)?;
        let key = CacheKey::nearby(center, radius_m);
        self.cache
            .fetch_through(key.as_str(), move || async move {
                self.store
                    .resources_within(center, radius_m)
                    .await
                    .map_err(CoreError::from)
            })
            .await
    }

    /// Like [`ProximityEngine::find_nearby`], keeping only resources of
    /// `incident_id`.
    ///
    /// # Errors
    ///
    /// Same as [`ProximityEngine::find_nearby`].
    pub async fn find_nearby_for_incident(
        &self,
        incident_id: IncidentId,
        center: &GeoPoint,
        radius_m: Option<f64>,
    ) -> Result<Cached<Vec<Resource>>, CoreError> {
        let Cached { value, cached } = self.find_nearby(center, radius_m).await?;
        let value = value
            .into_iter()
            .filter(|resource| resource.incident_id == incident_id)
            .collect();
        Ok(Cached { value, cached })
    }

    fn resolve_radius(&self, radius_m: Option<f64>) -> Result<f64, CoreError> {
        let radius_m = radius_m.unwrap_or(self.default_radius_m);
        if radius_m.is_finite() && radius_m > 0.0 {
            Ok(radius_m)
        } else {
            Err(CoreError::Validation(format!(
                "radius must be a positive number of metres, got {radius_m}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use relief_types::{IncidentDraft, ResourceDraft};

    use super::*;
    use crate::clock::Clock;

    fn engine(store: &StoreHandle) -> ProximityEngine {
        let cache = TtlCache::new(
            store.clone(),
            Clock::System,
            core::time::Duration::from_secs(3600),
        );
        ProximityEngine::new(store.clone(), cache, DEFAULT_RADIUS_M)
    }

    async fn seed_incident(store: &StoreHandle) -> IncidentId {
        let draft = IncidentDraft {
            title: String::from("Flood"),
            location_name: String::from("Manhattan, NYC"),
            location: GeoPoint::new(-74.0, 40.7),
            description: None,
            tags: BTreeSet::new(),
            owner_id: String::from("netrunnerX"),
            audit_trail: Vec::new(),
        };
        store
            .insert_incident(&draft)
            .await
            .map(|i| i.id)
            .unwrap_or_default()
    }

    async fn seed_resource(store: &StoreHandle, incident_id: IncidentId, at: GeoPoint) {
        let draft = ResourceDraft {
            incident_id,
            name: String::from("Shelter"),
            location_name: String::from("Somewhere"),
            location: at,
            kind: String::from("shelter"),
        };
        assert!(store.insert_resource(&draft).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_bad_radius_and_point() {
        let store = StoreHandle::memory();
        let engine = engine(&store);
        let origin = GeoPoint::new(0.0, 0.0);
        for radius in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let result = engine.find_nearby(&origin, Some(radius)).await;
            assert!(matches!(result, Err(CoreError::Validation(_))), "{radius}");
        }
        let result = engine.find_nearby(&GeoPoint::new(0.0, 95.0), None).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn second_query_is_served_from_cache() {
        let store = StoreHandle::memory();
        let engine = engine(&store);
        let incident = seed_incident(&store).await;
        seed_resource(&store, incident, GeoPoint::new(-74.01, 40.71)).await;

        let center = GeoPoint::new(-74.0, 40.7);
        let first = engine.find_nearby(&center, None).await.ok();
        let second = engine.find_nearby(&center, None).await.ok();
        assert_eq!(first.as_ref().map(|c| c.cached), Some(false));
        assert_eq!(second.as_ref().map(|c| c.cached), Some(true));
        let ids = |hit: Option<Cached<Vec<Resource>>>| {
            hit.map(|c| c.value.into_iter().map(|r| r.id).collect::<Vec<_>>())
        };
        assert_eq!(ids(first), ids(second));
    }

    #[tokio::test]
    async fn incident_view_filters_shared_result() {
        let store = StoreHandle::memory();
        let engine = engine(&store);
        let a = seed_incident(&store).await;
        let b = seed_incident(&store).await;
        seed_resource(&store, a, GeoPoint::new(-74.01, 40.71)).await;
        seed_resource(&store, b, GeoPoint::new(-74.02, 40.72)).await;

        let center = GeoPoint::new(-74.0, 40.7);
        let for_a = engine
            .find_nearby_for_incident(a, &center, None)
            .await
            .map(|c| c.value)
            .unwrap_or_default();
        assert_eq!(for_a.len(), 1);
        assert!(for_a.iter().all(|r| r.incident_id == a));

        let for_b = engine.find_nearby_for_incident(b, &center, None).await.ok();
        assert_eq!(for_b.as_ref().map(|c| c.cached), Some(true));
        assert_eq!(for_b.map(|c| c.value.len()), Some(1));
    }
}
