//! Axum router construction.
//!
//! Assembles the REST routes and the `WebSocket` route into one
//! [`Router`] with permissive CORS and HTTP request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// See [`handlers`] for the REST endpoints. `GET /ws/events` streams
/// mutation events. Unmatched paths get a JSON 404.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/geocode", post(handlers::geocode))
        .route(
            "/disasters",
            get(handlers::list_incidents).post(handlers::create_incident),
        )
        .route(
            "/disasters/{id}",
            put(handlers::update_incident).delete(handlers::delete_incident),
        )
        .route(
            "/disasters/{id}/resources",
            get(handlers::nearby_resources).post(handlers::create_resource),
        )
        .route(
            "/disasters/{id}/official-updates",
            get(handlers::official_updates),
        )
        .route("/browse/updates", get(handlers::browse_updates))
        .route("/ws/events", get(ws::ws_events))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
