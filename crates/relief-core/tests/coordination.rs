//! End-to-end coordination tests against the in-process store.
//!
//! Each test wires a fresh [`ReliefService`] to a manual clock so cache
//! expiry and audit timestamps are deterministic.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::too_many_lines
)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use relief_core::{
    Clock, CoreError, EventFilter, ReliefConfig, ReliefService, StoreHandle,
};
use relief_db::MemoryStore;
use relief_types::{
    AuditAction, EntityKind, EventName, GeoPoint, IncidentFilter, IncidentId, IncidentPatch,
    NewIncident, NewResource,
};
use tokio::sync::broadcast::error::TryRecvError;

const MANHATTAN: GeoPoint = GeoPoint::new(-74.0, 40.7);

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).single().unwrap()
}

fn service() -> (ReliefService, Clock) {
    let clock = Clock::manual(start());
    let service = ReliefService::new(StoreHandle::memory(), clock.clone(), &ReliefConfig::default());
    (service, clock)
}

fn flood() -> NewIncident {
    NewIncident {
        title: Some(String::from("NYC Flood")),
        location_name: Some(String::from("Manhattan, NYC")),
        location: Some(MANHATTAN),
        description: Some(String::from("Heavy flooding in Manhattan")),
        tags: Some(BTreeSet::from([String::from("flood"), String::from("urgent")])),
        owner_id: None,
    }
}

fn shelter(incident_id: IncidentId, at: GeoPoint) -> NewResource {
    NewResource {
        incident_id,
        name: Some(String::from("Red Cross Shelter")),
        location_name: Some(String::from("Lower East Side, NYC")),
        location: Some(at),
        kind: Some(String::from("shelter")),
    }
}

// =============================================================================
// Proximity
// =============================================================================

#[tokio::test]
async fn nearby_scenario_returns_only_the_close_resource() {
    let (service, _clock) = service();
    let incident = service.create_incident("netrunnerX", flood()).await.unwrap();
    let near = service
        .create_resource("netrunnerX", shelter(incident.id, GeoPoint::new(-74.01, 40.71)))
        .await
        .unwrap();
    service
        .create_resource("netrunnerX", shelter(incident.id, GeoPoint::new(10.0, 10.0)))
        .await
        .unwrap();

    let hits = service
        .proximity()
        .find_nearby(&MANHATTAN, Some(10_000.0))
        .await
        .unwrap();
    assert_eq!(hits.value.len(), 1);
    assert_eq!(hits.value[0].id, near.id);
}

#[tokio::test]
async fn nearby_results_lie_within_radius() {
    let (service, _clock) = service();
    let incident = service.create_incident("reliefAdmin", flood()).await.unwrap();
    for step in 0..20_i32 {
        let offset = f64::from(step) * 0.01;
        service
            .create_resource(
                "reliefAdmin",
                shelter(incident.id, GeoPoint::new(-74.0 + offset, 40.7 + offset)),
            )
            .await
            .unwrap();
    }

    for radius in [500.0, 5_000.0, 25_000.0] {
        let hits = service
            .proximity()
            .find_nearby(&MANHATTAN, Some(radius))
            .await
            .unwrap()
            .value;
        assert!(!hits.is_empty());
        let mut last = 0.0;
        for resource in &hits {
            let distance = MANHATTAN.distance_m(&resource.location);
            assert!(distance <= radius, "{distance} > {radius}");
            assert!(distance >= last);
            last = distance;
        }
    }
}

#[tokio::test]
async fn new_resource_is_visible_to_the_next_nearby_query() {
    let (service, _clock) = service();
    let incident = service.create_incident("citizen1", flood()).await.unwrap();

    let before = service
        .nearby_resources(incident.id, &MANHATTAN, None)
        .await
        .unwrap();
    assert!(before.value.is_empty());

    service
        .create_resource("citizen1", shelter(incident.id, GeoPoint::new(-74.001, 40.701)))
        .await
        .unwrap();
    let after = service
        .nearby_resources(incident.id, &MANHATTAN, None)
        .await
        .unwrap();
    assert!(!after.cached);
    assert_eq!(after.value.len(), 1);
}

// =============================================================================
// TTL cache
// =============================================================================

#[tokio::test]
async fn cache_hit_before_ttl_and_miss_after() {
    let (service, clock) = service();
    let cache = service.cache();
    cache.put("k", &serde_json::json!("v")).await;

    clock.advance(Duration::minutes(59));
    assert_eq!(cache.get("k").await, Some(serde_json::json!("v")));

    clock.set(start() + Duration::minutes(61));
    assert_eq!(cache.get("k").await, None);
}

#[tokio::test]
async fn repeated_gets_are_idempotent() {
    let (service, _clock) = service();
    let cache = service.cache();
    cache.put("k", &serde_json::json!({"n": 1})).await;
    let first = cache.get("k").await;
    let second = cache.get("k").await;
    assert_eq!(first, second);
    assert!(first.is_some());
}

#[tokio::test]
async fn last_set_wins() {
    let (service, _clock) = service();
    let cache = service.cache();
    let expires_at = start() + Duration::hours(1);
    cache.set("k", serde_json::json!("v1"), expires_at).await;
    cache.set("k", serde_json::json!("v2"), expires_at).await;
    assert_eq!(cache.get("k").await, Some(serde_json::json!("v2")));
}

#[tokio::test]
async fn incident_listing_is_cached_until_a_mutation() {
    let (service, _clock) = service();
    service.create_incident("netrunnerX", flood()).await.unwrap();

    let first = service.list_incidents(&IncidentFilter::default()).await.unwrap();
    let second = service.list_incidents(&IncidentFilter::default()).await.unwrap();
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.value.len(), 1);

    service.create_incident("netrunnerX", flood()).await.unwrap();
    let third = service.list_incidents(&IncidentFilter::default()).await.unwrap();
    assert!(!third.cached);
    assert_eq!(third.value.len(), 2);
}

#[tokio::test]
async fn feed_is_fetched_once_per_ttl() {
    let (service, clock) = service();
    let fetch = || async { Ok::<_, CoreError>(vec![String::from("FEMA update")]) };

    assert!(!service.cached_feed(fetch).await.unwrap().cached);
    assert!(service.cached_feed(fetch).await.unwrap().cached);

    clock.advance(Duration::hours(2));
    assert!(!service.cached_feed(fetch).await.unwrap().cached);
}

#[tokio::test]
async fn failing_cache_table_never_fails_reads_or_writes() {
    let store = MemoryStore::new();
    let service = ReliefService::new(
        StoreHandle::Memory(store.clone()),
        Clock::manual(start()),
        &ReliefConfig::default(),
    );
    let incident = service.create_incident("netrunnerX", flood()).await.unwrap();
    store.fail_cache_ops(true);

    // Writes still land while invalidation fails.
    service
        .create_resource("netrunnerX", shelter(incident.id, GeoPoint::new(-74.001, 40.701)))
        .await
        .unwrap();
    let patch = IncidentPatch {
        description: Some(String::from("Water receding")),
        ..IncidentPatch::default()
    };
    service
        .update_incident("reliefAdmin", incident.id, &patch)
        .await
        .unwrap();

    let fetch_count = AtomicUsize::new(0);
    let fetches = &fetch_count;
    let fetch = move || async move {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok::<_, CoreError>(vec![String::from("FEMA update")])
    };
    for _ in 0..2 {
        let listed = service.list_incidents(&IncidentFilter::default()).await.unwrap();
        assert!(!listed.cached);
        assert_eq!(listed.value.len(), 1);
        assert_eq!(listed.value[0].description.as_deref(), Some("Water receding"));

        let nearby = service
            .nearby_resources(incident.id, &MANHATTAN, None)
            .await
            .unwrap();
        assert!(!nearby.cached);
        assert_eq!(nearby.value.len(), 1);

        let feed = service.cached_feed(fetch).await.unwrap();
        assert!(!feed.cached);
        assert_eq!(feed.value, vec![String::from("FEMA update")]);
    }
    assert_eq!(fetch_count.load(Ordering::SeqCst), 2);
    assert_eq!(service.sweep_cache().await, 0);

    store.fail_cache_ops(false);
    assert!(!service.list_incidents(&IncidentFilter::default()).await.unwrap().cached);
    assert!(service.list_incidents(&IncidentFilter::default()).await.unwrap().cached);
}

// =============================================================================
// Audit trail
// =============================================================================

#[tokio::test]
async fn each_update_appends_one_entry_in_order() {
    let (service, clock) = service();
    let incident = service.create_incident("netrunnerX", flood()).await.unwrap();
    assert_eq!(incident.owner_id, "netrunnerX");
    assert_eq!(incident.audit_trail.len(), 1);

    let updates = 4;
    let mut latest = incident.clone();
    for n in 0..updates {
        clock.advance(Duration::seconds(30));
        let patch = IncidentPatch {
            description: Some(format!("update {n}")),
            ..IncidentPatch::default()
        };
        latest = service
            .update_incident("reliefAdmin", incident.id, &patch)
            .await
            .unwrap();
    }

    assert_eq!(latest.audit_trail.len(), updates + 1);
    assert_eq!(latest.audit_trail[0], incident.audit_trail[0]);
    assert!(latest.audit_trail[1..]
        .iter()
        .all(|e| e.action == AuditAction::Update && e.user_id == "reliefAdmin"));
    assert!(latest
        .audit_trail
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    assert_eq!(latest.title, incident.title);
}

#[tokio::test]
async fn concurrent_updates_keep_every_entry() {
    let (service, _clock) = service();
    let incident = service.create_incident("netrunnerX", flood()).await.unwrap();

    let updates = (0..16).map(|n| {
        let service = service.clone();
        async move {
            let patch = IncidentPatch {
                description: Some(format!("update {n}")),
                ..IncidentPatch::default()
            };
            service
                .update_incident(&format!("user{n}"), incident.id, &patch)
                .await
        }
    });
    for result in futures::future::join_all(updates).await {
        result.unwrap();
    }

    let stored = service
        .list_incidents(&IncidentFilter::by_id(incident.id))
        .await
        .unwrap();
    assert_eq!(stored.value[0].audit_trail.len(), 17);
}

#[tokio::test]
async fn delete_then_get_is_empty() {
    let (service, _clock) = service();
    let incident = service.create_incident("netrunnerX", flood()).await.unwrap();
    let filter = IncidentFilter::by_id(incident.id);

    let cached = service.list_incidents(&filter).await.unwrap();
    assert_eq!(cached.value.len(), 1);

    service.delete_incident("reliefAdmin", incident.id).await.unwrap();
    let after = service.list_incidents(&filter).await.unwrap();
    assert!(after.value.is_empty());

    let again = service.delete_incident("reliefAdmin", incident.id).await;
    assert!(matches!(again, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn deleting_an_incident_removes_its_resources_from_nearby() {
    let (service, _clock) = service();
    let incident = service.create_incident("netrunnerX", flood()).await.unwrap();
    service
        .create_resource("netrunnerX", shelter(incident.id, GeoPoint::new(-74.01, 40.71)))
        .await
        .unwrap();
    let warm = service.proximity().find_nearby(&MANHATTAN, None).await.unwrap();
    assert_eq!(warm.value.len(), 1);

    service.delete_incident("netrunnerX", incident.id).await.unwrap();
    let cold = service.proximity().find_nearby(&MANHATTAN, None).await.unwrap();
    assert!(cold.value.is_empty());
}

// =============================================================================
// Broadcast
// =============================================================================

#[tokio::test]
async fn every_mutation_publishes_exactly_one_event() {
    let (service, _clock) = service();
    let mut all = service.subscribe(EventFilter::all());

    let incident = service.create_incident("netrunnerX", flood()).await.unwrap();
    let patch = IncidentPatch {
        title: Some(String::from("NYC Flood (receding)")),
        ..IncidentPatch::default()
    };
    service
        .update_incident("netrunnerX", incident.id, &patch)
        .await
        .unwrap();
    let resource = service
        .create_resource("netrunnerX", shelter(incident.id, MANHATTAN))
        .await
        .unwrap();
    service.delete_incident("netrunnerX", incident.id).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = all.try_recv() {
        seen.push((event.event, event.entity, event.action, event.id));
    }
    assert_eq!(
        seen,
        vec![
            (EventName::IncidentUpdated, EntityKind::Incident, AuditAction::Create, incident.id.into_inner()),
            (EventName::IncidentUpdated, EntityKind::Incident, AuditAction::Update, incident.id.into_inner()),
            (EventName::ResourcesUpdated, EntityKind::Resource, AuditAction::Create, resource.id.into_inner()),
            (EventName::IncidentUpdated, EntityKind::Incident, AuditAction::Delete, incident.id.into_inner()),
        ]
    );
}

#[tokio::test]
async fn failed_mutations_publish_nothing() {
    let (service, _clock) = service();
    let mut all = service.subscribe(EventFilter::all());

    let invalid = service.create_incident("guest", NewIncident::default()).await;
    assert!(matches!(invalid, Err(CoreError::Validation(_))));

    let missing = IncidentId::new();
    let update = service
        .update_incident("guest", missing, &IncidentPatch::default())
        .await;
    assert!(matches!(update, Err(CoreError::NotFound(_))));
    let delete = service.delete_incident("guest", missing).await;
    assert!(matches!(delete, Err(CoreError::NotFound(_))));
    let orphan = service
        .create_resource("guest", shelter(missing, MANHATTAN))
        .await;
    assert!(matches!(orphan, Err(CoreError::NotFound(_))));

    assert!(matches!(all.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn late_subscriber_misses_earlier_events() {
    let (service, _clock) = service();
    service.create_incident("netrunnerX", flood()).await.unwrap();

    let mut late = service.subscribe(EventFilter::only([EventName::IncidentUpdated]));
    assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));

    service.create_incident("netrunnerX", flood()).await.unwrap();
    assert!(late.try_recv().is_ok());
}
