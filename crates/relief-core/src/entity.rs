//! Validated CRUD over incidents and resources.
//!
//! Input is checked before anything touches the store, so a validation
//! or not-found failure never leaves a side effect behind. This layer
//! neither invalidates the cache nor publishes events.

use relief_types::{
    AuditEntry, GeoPoint, Incident, IncidentDraft, IncidentFilter, IncidentId, IncidentPatch,
    NewIncident, NewResource, Resource, ResourceDraft,
};
use validator::Validate;

use crate::audit::resolve_owner;
use crate::backend::StoreHandle;
use crate::error::CoreError;

/// Incident and resource persistence with input validation.
#[derive(Debug, Clone)]
pub struct EntityStore {
    store: StoreHandle,
}

impl EntityStore {
    /// Wrap a store handle.
    pub const fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Store a new incident. The trail starts empty, or with
    /// `first_entry` when given.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `title`, `location_name` or
    /// `location` is missing, blank or out of range.
    pub async fn create_incident(
        &self,
        fields: NewIncident,
        first_entry: Option<AuditEntry>,
    ) -> Result<Incident, CoreError> {
        fields.validate()?;
        let owner_id = resolve_owner(fields.owner_id.as_deref(), first_entry.as_ref());
        let title = required_text("title", fields.title)?;
        let location_name = required_text("location_name", fields.location_name)?;
        let location = required_point(fields.location)?;

        let draft = IncidentDraft {
            title,
            location_name,
            location,
            description: fields.description,
            tags: fields.tags.unwrap_or_default(),
            owner_id,
            audit_trail: first_entry.into_iter().collect(),
        };
        Ok(self.store.insert_incident(&draft).await?)
    }

    /// Every incident matching `filter`. An empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the query fails.
    pub async fn get_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, CoreError> {
        Ok(self.store.select_incidents(filter).await?)
    }

    /// Merge the present fields of `patch` and append `entry`, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a blank or out-of-range
    /// field, or [`CoreError::NotFound`] if no incident has `id`.
    pub async fn update_incident(
        &self,
        id: IncidentId,
        patch: &IncidentPatch,
        entry: &AuditEntry,
    ) -> Result<Incident, CoreError> {
        patch.validate()?;
        if let Some(title) = &patch.title {
            reject_blank("title", title)?;
        }
        if let Some(location_name) = &patch.location_name {
            reject_blank("location_name", location_name)?;
        }
        if let Some(location) = &patch.location {
            location.validate()?;
        }
        self.store
            .update_incident(id, patch, entry)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Append `entry` to the trail, then delete the incident and its
    /// resources.
    ///
    /// The append and the delete are separate store operations; if the
    /// delete fails the appended entry remains.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no incident has `id`.
    pub async fn delete_incident(&self, id: IncidentId, entry: &AuditEntry) -> Result<(), CoreError> {
        if !self.store.append_audit(id, entry).await? {
            return Err(not_found(id));
        }
        if !self.store.delete_incident(id).await? {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Store a new resource for an existing incident.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `name`, `location_name`,
    /// `location` or `type` is missing or blank, or
    /// [`CoreError::NotFound`] if the incident does not exist.
    pub async fn create_resource(&self, fields: NewResource) -> Result<Resource, CoreError> {
        fields.validate()?;
        let draft = ResourceDraft {
            incident_id: fields.incident_id,
            name: required_text("name", fields.name)?,
            location_name: required_text("location_name", fields.location_name)?,
            location: required_point(fields.location)?,
            kind: required_text("type", fields.kind)?,
        };
        if !self.store.incident_exists(draft.incident_id).await? {
            return Err(not_found(draft.incident_id));
        }
        Ok(self.store.insert_resource(&draft).await?)
    }
}

fn not_found(id: IncidentId) -> CoreError {
    CoreError::NotFound(format!("incident {id}"))
}

fn reject_blank(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field}: must not be blank")));
    }
    Ok(())
}

fn required_text(field: &str, value: Option<String>) -> Result<String, CoreError> {
    let value = value.ok_or_else(|| CoreError::Validation(format!("{field}: required")))?;
    reject_blank(field, &value)?;
    Ok(value)
}

fn required_point(location: Option<GeoPoint>) -> Result<GeoPoint, CoreError> {
    let location =
        location.ok_or_else(|| CoreError::Validation(String::from("location: required")))?;
    location.validate()?;
    Ok(location)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use relief_types::{AuditAction, GUEST_ACTOR};

    use super::*;

    fn new_incident(title: &str) -> NewIncident {
        NewIncident {
            title: Some(title.to_owned()),
            location_name: Some(String::from("Manhattan, NYC")),
            location: Some(GeoPoint::new(-74.0, 40.7)),
            tags: Some(BTreeSet::from([String::from("flood")])),
            ..NewIncident::default()
        }
    }

    fn new_resource(incident_id: IncidentId) -> NewResource {
        NewResource {
            incident_id,
            name: Some(String::from("Red Cross Shelter")),
            location_name: Some(String::from("Lower East Side, NYC")),
            location: Some(GeoPoint::new(-73.98, 40.71)),
            kind: Some(String::from("shelter")),
        }
    }

    #[tokio::test]
    async fn create_without_entry_has_empty_trail_and_guest_owner() {
        let entities = EntityStore::new(StoreHandle::memory());
        let incident = entities.create_incident(new_incident("Flood"), None).await;
        let incident = incident.ok();
        assert_eq!(incident.as_ref().map(|i| i.audit_trail.len()), Some(0));
        assert_eq!(incident.map(|i| i.owner_id).as_deref(), Some(GUEST_ACTOR));
    }

    #[tokio::test]
    async fn create_with_entry_owns_by_actor() {
        let entities = EntityStore::new(StoreHandle::memory());
        let entry = AuditEntry::new(AuditAction::Create, "netrunnerX", Utc::now());
        let incident = entities
            .create_incident(new_incident("Flood"), Some(entry.clone()))
            .await
            .ok();
        assert_eq!(incident.as_ref().map(|i| i.owner_id.as_str()), Some("netrunnerX"));
        assert_eq!(incident.map(|i| i.audit_trail), Some(vec![entry]));
    }

    #[tokio::test]
    async fn blank_or_out_of_range_input_is_rejected_without_side_effects() {
        let entities = EntityStore::new(StoreHandle::memory());
        let blank = entities.create_incident(new_incident("   "), None).await;
        assert!(matches!(blank, Err(CoreError::Validation(_))));

        let mut far = new_incident("Flood");
        far.location = Some(GeoPoint::new(200.0, 0.0));
        let far = entities.create_incident(far, None).await;
        assert!(matches!(far, Err(CoreError::Validation(_))));

        let all = entities.get_incidents(&IncidentFilter::default()).await;
        assert_eq!(all.map(|v| v.len()).ok(), Some(0));
    }

    #[tokio::test]
    async fn update_of_unknown_incident_is_not_found() {
        let entities = EntityStore::new(StoreHandle::memory());
        let entry = AuditEntry::new(AuditAction::Update, "guest", Utc::now());
        let result = entities
            .update_incident(IncidentId::new(), &IncidentPatch::default(), &entry)
            .await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_of_unknown_incident_is_not_found() {
        let entities = EntityStore::new(StoreHandle::memory());
        let entry = AuditEntry::new(AuditAction::Delete, "guest", Utc::now());
        let result = entities.delete_incident(IncidentId::new(), &entry).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn resource_requires_fields_and_existing_incident() {
        let entities = EntityStore::new(StoreHandle::memory());
        let orphan = entities.create_resource(new_resource(IncidentId::new())).await;
        assert!(matches!(orphan, Err(CoreError::NotFound(_))));

        let incident = entities
            .create_incident(new_incident("Flood"), None)
            .await
            .map(|i| i.id)
            .unwrap_or_default();
        let mut untyped = new_resource(incident);
        untyped.kind = None;
        let untyped = entities.create_resource(untyped).await;
        assert!(matches!(untyped, Err(CoreError::Validation(_))));

        let created = entities.create_resource(new_resource(incident)).await.ok();
        assert_eq!(created.map(|r| r.incident_id), Some(incident));
    }
}
