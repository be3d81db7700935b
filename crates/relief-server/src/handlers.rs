//! REST endpoint handlers.
//!
//! Handlers check request shape, resolve place names through the
//! geocoder, and hand everything else to [`ReliefService`]. Successful
//! responses use the `{"success": true, "data": ..}` envelope; cached
//! reads add a `cached` flag.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Service status |
//! | `POST` | `/geocode` | Resolve free text to coordinates |
//! | `GET` | `/disasters` | List incidents by equality filter |
//! | `POST` | `/disasters` | Create an incident |
//! | `PUT` | `/disasters/{id}` | Update an incident |
//! | `DELETE` | `/disasters/{id}` | Delete an incident and its resources |
//! | `GET` | `/disasters/{id}/resources` | Resources of an incident near a point |
//! | `POST` | `/disasters/{id}/resources` | Create a resource |
//! | `GET` | `/disasters/{id}/official-updates` | Official updates, cached |
//! | `GET` | `/browse/updates` | Official updates, uncached |
//!
//! [`ReliefService`]: relief_core::ReliefService

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use relief_core::CoreError;
use relief_types::{
    GeoPoint, Incident, IncidentFilter, IncidentId, IncidentPatch, NewIncident, NewResource,
    Resource,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::feeds::OfficialUpdates;
use crate::geocode::Place;
use crate::identity::Actor;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Envelope and request bodies
// ---------------------------------------------------------------------------

/// Success response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `true`; failures use the error body instead.
    pub success: bool,
    /// The payload.
    pub data: T,
    /// Whether `data` came from the cache, on cached reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl<T> Envelope<T> {
    const fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            cached: None,
        })
    }

    const fn with_cached(data: T, cached: bool) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            cached: Some(cached),
        })
    }
}

/// Body of `POST /geocode`.
#[derive(Debug, Deserialize)]
pub struct GeocodeRequest {
    /// Free text naming a place.
    pub text: Option<String>,
}

/// Payload of a successful geocode.
#[derive(Debug, Serialize)]
pub struct GeocodeResult {
    /// The text as submitted.
    pub original_text: String,
    /// Resolved coordinates.
    pub coordinates: GeoPoint,
    /// Address of the match.
    pub formatted_address: String,
}

/// Body of `POST /disasters`.
#[derive(Debug, Deserialize)]
pub struct CreateIncidentRequest {
    /// Short headline.
    pub title: Option<String>,
    /// Place name, resolved through the geocoder.
    pub location_name: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Classification tags.
    pub tags: Option<BTreeSet<String>>,
    /// Explicit owner; defaults to the caller.
    pub owner_id: Option<String>,
}

/// Body of `PUT /disasters/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateIncidentRequest {
    /// New headline.
    pub title: Option<String>,
    /// New place name. Coordinates are not re-resolved.
    pub location_name: Option<String>,
    /// New longitude; requires `latitude`.
    pub longitude: Option<f64>,
    /// New latitude; requires `longitude`.
    pub latitude: Option<f64>,
    /// New description.
    pub description: Option<String>,
    /// Replacement tags.
    pub tags: Option<BTreeSet<String>>,
}

/// Body of `POST /disasters/{id}/resources`.
#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    /// Display name.
    pub name: Option<String>,
    /// Place name, resolved through the geocoder.
    pub location_name: Option<String>,
    /// Classifier such as `shelter`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Query of `GET /disasters/{id}/resources`.
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    /// Latitude of the search centre.
    pub lat: Option<f64>,
    /// Longitude of the search centre.
    pub lon: Option<f64>,
    /// Search radius in metres; the configured default when absent.
    pub radius: Option<f64>,
}

/// Filter keys accepted by `GET /disasters`, besides the identity key.
const FILTER_KEYS: [&str; 4] = ["id", "owner_id", "title", "location_name"];

// ---------------------------------------------------------------------------
// Status and geocoding
// ---------------------------------------------------------------------------

/// `GET /` -- service status.
pub async fn index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = match state.service.store().ping().await {
        Ok(()) => "reachable",
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            "unreachable"
        }
    };
    Json(serde_json::json!({
        "message": "Welcome to the Disaster Response API",
        "status": "operational",
        "store": {
            "backend": state.service.store().backend_name(),
            "status": store,
        },
        "subscribers": state.service.broadcaster().subscriber_count(),
    }))
}

/// `POST /geocode` -- resolve `text` to coordinates.
pub async fn geocode(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GeocodeRequest>, JsonRejection>,
) -> Result<Json<Envelope<GeocodeResult>>, ApiError> {
    let request = json_body(payload)?;
    let text = required("text", request.text)?;
    let place = state
        .geocoder
        .resolve(&text)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("location for {text:?}")))?;
    Ok(Envelope::ok(GeocodeResult {
        original_text: text,
        coordinates: place.location,
        formatted_address: place.display_name,
    }))
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// `GET /disasters` -- incidents matching the query's equality filter.
pub async fn list_incidents(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BTreeMap<String, String>>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Incident>>>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filter = incident_filter(params)?;
    let result = state.service.list_incidents(&filter).await?;
    Ok(Envelope::with_cached(result.value, result.cached))
}

/// `POST /disasters` -- create an incident at the geocoded `location_name`.
pub async fn create_incident(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    payload: Result<Json<CreateIncidentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Incident>>), ApiError> {
    let request = json_body(payload)?;
    let title = required("title", request.title)?;
    let location_name = required("location_name", request.location_name)?;
    let place = resolve_place(&state, &location_name).await?;

    let fields = NewIncident {
        title: Some(title),
        location_name: Some(location_name),
        location: Some(place.location),
        description: request.description,
        tags: request.tags,
        owner_id: request.owner_id,
    };
    let incident = state
        .service
        .create_incident(&actor.username, fields)
        .await?;
    Ok((StatusCode::CREATED, Envelope::ok(incident)))
}

/// `PUT /disasters/{id}` -- merge the present fields into an incident.
pub async fn update_incident(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<UpdateIncidentRequest>, JsonRejection>,
) -> Result<Json<Envelope<Incident>>, ApiError> {
    let id = incident_id(&id)?;
    let request = json_body(payload)?;
    let location = match (request.longitude, request.latitude) {
        (Some(longitude), Some(latitude)) => Some(GeoPoint::new(longitude, latitude)),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(String::from(
                "longitude and latitude must be given together",
            )));
        }
    };
    let patch = IncidentPatch {
        title: request.title,
        location_name: request.location_name,
        location,
        description: request.description,
        tags: request.tags,
    };
    let incident = state
        .service
        .update_incident(&actor.username, id, &patch)
        .await?;
    Ok(Envelope::ok(incident))
}

/// `DELETE /disasters/{id}` -- delete an incident and its resources.
pub async fn delete_incident(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = incident_id(&id)?;
    state.service.delete_incident(&actor.username, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// `GET /disasters/{id}/resources?lat&lon&radius` -- resources of the
/// incident within `radius` metres of the point, nearest first.
pub async fn nearby_resources(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<NearbyQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Resource>>>, ApiError> {
    let id = incident_id(&id)?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (Some(latitude), Some(longitude)) = (query.lat, query.lon) else {
        return Err(ApiError::BadRequest(String::from(
            "lat and lon query parameters are required",
        )));
    };
    let center = GeoPoint::new(longitude, latitude);
    let result = state
        .service
        .nearby_resources(id, &center, query.radius)
        .await?;
    Ok(Envelope::with_cached(result.value, result.cached))
}

/// `POST /disasters/{id}/resources` -- create a resource at the geocoded
/// `location_name`.
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<CreateResourceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Resource>>), ApiError> {
    let incident_id = incident_id(&id)?;
    let request = json_body(payload)?;
    let name = required("name", request.name)?;
    let location_name = required("location_name", request.location_name)?;
    let kind = required("type", request.kind)?;
    let place = resolve_place(&state, &location_name).await?;

    let fields = NewResource {
        incident_id,
        name: Some(name),
        location_name: Some(location_name),
        location: Some(place.location),
        kind: Some(kind),
    };
    let resource = state
        .service
        .create_resource(&actor.username, fields)
        .await?;
    Ok((StatusCode::CREATED, Envelope::ok(resource)))
}

// ---------------------------------------------------------------------------
// Official updates
// ---------------------------------------------------------------------------

/// `GET /disasters/{id}/official-updates` -- official updates through the
/// TTL cache. The feed is shared by every incident.
pub async fn official_updates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<OfficialUpdates>>, ApiError> {
    let id = incident_id(&id)?;
    let feeds = &state.feeds;
    let result = state
        .service
        .cached_feed(move || async move { feeds.fetch_all().await.map_err(CoreError::from) })
        .await?;
    tracing::debug!(incident_id = %id, cached = result.cached, "Official updates served");
    Ok(Envelope::with_cached(result.value, result.cached))
}

/// `GET /browse/updates` -- official updates straight from the source.
pub async fn browse_updates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<OfficialUpdates>>, ApiError> {
    let updates = state.feeds.fetch_all().await?;
    Ok(Envelope::ok(updates))
}

/// Fallback for unmatched routes.
#[allow(clippy::unused_async)]
pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "not_found",
            "message": "The requested resource was not found",
            "status": StatusCode::NOT_FOUND.as_u16(),
        })),
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn incident_id(raw: &str) -> Result<IncidentId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid incident id {raw:?}: {e}")))
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CoreError::Validation(format!("{field}: required")).into()),
    }
}

async fn resolve_place(state: &AppState, location_name: &str) -> Result<Place, ApiError> {
    state.geocoder.resolve(location_name).await?.ok_or_else(|| {
        CoreError::Validation(format!("location_name: no match for {location_name:?}")).into()
    })
}

fn incident_filter(params: BTreeMap<String, String>) -> Result<IncidentFilter, ApiError> {
    let mut filter = IncidentFilter::default();
    for (key, value) in params {
        match key.as_str() {
            "id" => filter.id = Some(incident_id(&value)?),
            "owner_id" => filter.owner_id = Some(value),
            "title" => filter.title = Some(value),
            "location_name" => filter.location_name = Some(value),
            "user" => {}
            other => {
                return Err(ApiError::BadRequest(format!(
                    "unknown filter key {other:?}; expected one of {}",
                    FILTER_KEYS.join(", ")
                )));
            }
        }
    }
    Ok(filter)
}
