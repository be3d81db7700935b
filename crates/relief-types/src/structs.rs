//! Core record structs: incidents, resources, and their audit trail.
//!
//! Stored records ([`Incident`], [`Resource`]) are what the store returns
//! and what clients receive. Input shapes ([`NewIncident`],
//! [`IncidentPatch`], [`NewResource`]) carry the caller's fields before
//! the store assigns identifiers and timestamps.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::Validate;

use crate::geo::GeoPoint;
use crate::ids::{IncidentId, ResourceId};

/// Owner recorded when neither the caller nor the first audit entry names one.
pub const GUEST_ACTOR: &str = "guest";

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// Kind of mutation recorded in an [`AuditEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AuditAction {
    /// The incident was created.
    Create,
    /// One or more incident fields were changed.
    Update,
    /// The incident was deleted.
    Delete,
}

/// One append-only entry in an incident's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AuditEntry {
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub user_id: String,
    /// When it happened (RFC 3339, UTC).
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry for `action` performed by `user_id` at `timestamp`.
    pub fn new(action: AuditAction, user_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            user_id: user_id.into(),
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// A stored disaster incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Incident {
    /// Store-assigned identifier.
    pub id: IncidentId,
    /// Short headline.
    pub title: String,
    /// Free-text place name the location was resolved from.
    pub location_name: String,
    /// Resolved coordinates.
    pub location: GeoPoint,
    /// Longer free-text description.
    pub description: Option<String>,
    /// Classification tags.
    pub tags: BTreeSet<String>,
    /// Identity that owns the incident.
    pub owner_id: String,
    /// Chronological mutation history.
    pub audit_trail: Vec<AuditEntry>,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
    /// Store-assigned time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new incident.
///
/// `title`, `location_name` and `location` are required; they are
/// optional here so a missing field surfaces as a validation error
/// instead of a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewIncident {
    /// Short headline.
    #[validate(required, length(min = 1, max = 512))]
    pub title: Option<String>,
    /// Free-text place name.
    #[validate(required, length(min = 1, max = 512))]
    pub location_name: Option<String>,
    /// Resolved coordinates.
    #[validate(required)]
    pub location: Option<GeoPoint>,
    /// Longer free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Classification tags.
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    /// Owning identity; defaults to the creating actor.
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Partial update for an incident. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IncidentPatch {
    /// New headline.
    #[validate(length(min = 1, max = 512))]
    pub title: Option<String>,
    /// New place name.
    #[validate(length(min = 1, max = 512))]
    pub location_name: Option<String>,
    /// New coordinates.
    pub location: Option<GeoPoint>,
    /// New description.
    pub description: Option<String>,
    /// Replacement tag set.
    pub tags: Option<BTreeSet<String>>,
}

impl IncidentPatch {
    /// Apply the present fields over `incident` in place.
    pub fn apply_to(&self, incident: &mut Incident) {
        if let Some(title) = &self.title {
            incident.title.clone_from(title);
        }
        if let Some(location_name) = &self.location_name {
            incident.location_name.clone_from(location_name);
        }
        if let Some(location) = self.location {
            incident.location = location;
        }
        if let Some(description) = &self.description {
            incident.description = Some(description.clone());
        }
        if let Some(tags) = &self.tags {
            incident.tags.clone_from(tags);
        }
    }
}

/// Validated incident ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentDraft {
    /// Short headline.
    pub title: String,
    /// Free-text place name.
    pub location_name: String,
    /// Resolved coordinates.
    pub location: GeoPoint,
    /// Longer free-text description.
    pub description: Option<String>,
    /// Classification tags.
    pub tags: BTreeSet<String>,
    /// Owning identity.
    pub owner_id: String,
    /// Initial trail: empty, or the caller's first entry.
    pub audit_trail: Vec<AuditEntry>,
}

/// Equality filter over incident columns.
///
/// Only the listed columns are filterable; every present field must match
/// exactly. An empty filter matches every incident.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IncidentFilter {
    /// Match on identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IncidentId>,
    /// Match on owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Match on exact title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Match on exact place name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
}

impl IncidentFilter {
    /// Filter that selects a single incident by ID.
    pub fn by_id(id: IncidentId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Whether `incident` satisfies every present field.
    pub fn matches(&self, incident: &Incident) -> bool {
        self.id.is_none_or(|id| incident.id == id)
            && self
                .owner_id
                .as_ref()
                .is_none_or(|owner| &incident.owner_id == owner)
            && self
                .title
                .as_ref()
                .is_none_or(|title| &incident.title == title)
            && self
                .location_name
                .as_ref()
                .is_none_or(|name| &incident.location_name == name)
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A stored relief resource (shelter, clinic, depot...) tied to an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Resource {
    /// Store-assigned identifier.
    pub id: ResourceId,
    /// Incident this resource serves.
    pub incident_id: IncidentId,
    /// Display name.
    pub name: String,
    /// Free-text place name the location was resolved from.
    pub location_name: String,
    /// Resolved coordinates.
    pub location: GeoPoint,
    /// Classifier such as `shelter` or `medical`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewResource {
    /// Incident this resource serves.
    pub incident_id: IncidentId,
    /// Display name.
    #[validate(required, length(min = 1, max = 512))]
    pub name: Option<String>,
    /// Free-text place name.
    #[validate(required, length(min = 1, max = 512))]
    pub location_name: Option<String>,
    /// Resolved coordinates.
    #[validate(required)]
    pub location: Option<GeoPoint>,
    /// Classifier such as `shelter` or `medical`.
    #[serde(rename = "type")]
    #[validate(required, length(min = 1, max = 64))]
    pub kind: Option<String>,
}

/// Validated resource ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDraft {
    /// Incident this resource serves.
    pub incident_id: IncidentId,
    /// Display name.
    pub name: String,
    /// Free-text place name.
    pub location_name: String,
    /// Resolved coordinates.
    pub location: GeoPoint,
    /// Classifier.
    pub kind: String,
}
