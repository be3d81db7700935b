//! Shared type definitions for the relief coordination service.
//!
//! Every crate in the workspace speaks these types: the data layer
//! persists them, the coordination core moves them between cache, store
//! and broadcast, and the service surface serializes them to clients.
//! Types flow to `TypeScript` via `ts-rs` for dashboard clients.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for incident and resource IDs
//! - [`geo`] -- WGS84 points, EWKT encoding, great-circle distance
//! - [`structs`] -- Incidents, resources, audit entries, filters
//! - [`events`] -- Mutation notifications for broadcast subscribers

pub mod events;
pub mod geo;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use events::{EntityKind, EventName, MutationEvent};
pub use geo::{EARTH_MEAN_RADIUS_M, GeoPoint, SRID_WGS84};
pub use ids::{IncidentId, ResourceId};
pub use structs::{
    AuditAction, AuditEntry, GUEST_ACTOR, Incident, IncidentDraft, IncidentFilter, IncidentPatch,
    NewIncident, NewResource, Resource, ResourceDraft,
};
