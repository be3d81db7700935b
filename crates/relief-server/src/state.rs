//! Shared application state for the service surface.
//!
//! [`AppState`] is built once at startup and shared behind an [`Arc`]
//! with every handler. It owns the coordination layer and the two
//! upstream collaborators; all per-request state lives in the handlers.
//!
//! [`Arc`]: std::sync::Arc

use relief_core::ReliefService;

use crate::feeds::FeedSource;
use crate::geocode::Geocoder;

/// Shared state available to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Cache, store, audit and broadcast coordination.
    pub service: ReliefService,
    /// Place-name resolution for new incidents and resources.
    pub geocoder: Geocoder,
    /// Official updates source.
    pub feeds: FeedSource,
}

impl AppState {
    /// Bundle the service with its upstream collaborators.
    pub const fn new(service: ReliefService, geocoder: Geocoder, feeds: FeedSource) -> Self {
        Self {
            service,
            geocoder,
            feeds,
        }
    }
}
