//! Mutation notifications pushed to broadcast subscribers.
//!
//! Every successful mutation emits exactly one [`MutationEvent`]. The
//! `event` name is what subscribers filter on; `entity` and `id` name the
//! record that changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::structs::AuditAction;

/// Broadcast event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventName {
    /// An incident was created, updated or deleted.
    IncidentUpdated,
    /// A resource was added to an incident.
    ResourcesUpdated,
}

impl EventName {
    /// Every event name, in wire order.
    pub const ALL: [Self; 2] = [Self::IncidentUpdated, Self::ResourcesUpdated];

    /// Wire name of the event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncidentUpdated => "incident_updated",
            Self::ResourcesUpdated => "resources_updated",
        }
    }

    /// Parse a wire name. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name.trim())
    }
}

impl core::fmt::Display for EventName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of record a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntityKind {
    /// A disaster incident.
    Incident,
    /// A relief resource.
    Resource,
}

/// One announced mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MutationEvent {
    /// Subscriber-facing event name.
    pub event: EventName,
    /// Kind of record that changed.
    pub entity: EntityKind,
    /// Identifier of the record that changed.
    pub id: Uuid,
    /// What happened to it.
    pub action: AuditAction,
    /// The record after the change, or identifying fields when the record
    /// no longer exists.
    pub payload: serde_json::Value,
    /// When the event was published.
    pub emitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip_through_wire_form() {
        for name in EventName::ALL {
            assert_eq!(EventName::parse(name.as_str()), Some(name));
        }
        assert_eq!(EventName::parse(" incident_updated "), Some(EventName::IncidentUpdated));
        assert_eq!(EventName::parse("disaster_updated"), None);
    }

    #[test]
    fn event_serializes_snake_case() {
        let event = MutationEvent {
            event: EventName::ResourcesUpdated,
            entity: EntityKind::Resource,
            id: Uuid::nil(),
            action: AuditAction::Create,
            payload: serde_json::json!({}),
            emitted_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["event"], "resources_updated");
        assert_eq!(json["entity"], "resource");
        assert_eq!(json["action"], "create");
    }
}
