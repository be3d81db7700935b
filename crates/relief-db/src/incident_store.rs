//! Incident persistence.
//!
//! Locations are written as EWKT through `ST_GeogFromText` and read back
//! with `ST_X`/`ST_Y` on the geometry cast, so no `PostGIS` client types
//! leak into the record shape. The audit trail lives in a `JSONB` array
//! column and is only ever extended with `||`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use relief_types::{
    AuditEntry, GeoPoint, Incident, IncidentDraft, IncidentFilter, IncidentId, IncidentPatch,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DbError;

/// Column list shared by every query that returns an [`IncidentRow`].
macro_rules! incident_columns {
    () => {
        "id, title, location_name, \
         ST_X(location::geometry) AS longitude, ST_Y(location::geometry) AS latitude, \
         description, tags, owner_id, audit_trail, created_at, updated_at"
    };
}

/// Operations on the `incidents` table.
pub struct IncidentStore<'a> {
    pool: &'a PgPool,
}

impl<'a> IncidentStore<'a> {
    /// Create a new incident store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a validated incident and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, draft: &IncidentDraft) -> Result<Incident, DbError> {
        let tags: Vec<String> = draft.tags.iter().cloned().collect();
        let trail = serde_json::to_value(&draft.audit_trail)?;

        let row = sqlx::query_as::<_, IncidentRow>(concat!(
            "INSERT INTO incidents (title, location_name, location, description, tags, owner_id, audit_trail) ",
            "VALUES ($1, $2, ST_GeogFromText($3), $4, $5, $6, $7) ",
            "RETURNING ",
            incident_columns!()
        ))
        .bind(&draft.title)
        .bind(&draft.location_name)
        .bind(draft.location.to_ewkt())
        .bind(draft.description.as_deref())
        .bind(&tags)
        .bind(&draft.owner_id)
        .bind(&trail)
        .fetch_one(self.pool)
        .await?;

        let incident = Incident::try_from(row)?;
        tracing::debug!(id = %incident.id, "Inserted incident");
        Ok(incident)
    }

    /// Select every incident matching `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::CorruptRow`] if a stored audit trail cannot be decoded.
    pub async fn select(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            incident_columns!(),
            " FROM incidents WHERE TRUE"
        ));
        if let Some(id) = filter.id {
            qb.push(" AND id = ").push_bind(id.into_inner());
        }
        if let Some(owner_id) = &filter.owner_id {
            qb.push(" AND owner_id = ").push_bind(owner_id.clone());
        }
        if let Some(title) = &filter.title {
            qb.push(" AND title = ").push_bind(title.clone());
        }
        if let Some(location_name) = &filter.location_name {
            qb.push(" AND location_name = ").push_bind(location_name.clone());
        }
        qb.push(" ORDER BY created_at, id");

        let rows: Vec<IncidentRow> = qb.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(Incident::try_from).collect()
    }

    /// Whether an incident with `id` exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn exists(&self, id: IncidentId) -> Result<bool, DbError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM incidents WHERE id = $1)")
                .bind(id.into_inner())
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Merge `patch` over the stored incident and append `entry` to its
    /// trail in a single statement.
    ///
    /// The merge and the append happen under the row lock taken by
    /// `UPDATE`, so concurrent updates to the same incident serialize and
    /// no audit entry is lost.
    ///
    /// Returns `None` if no incident has `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn update(
        &self,
        id: IncidentId,
        patch: &IncidentPatch,
        entry: &AuditEntry,
    ) -> Result<Option<Incident>, DbError> {
        let location = patch.location.as_ref().map(GeoPoint::to_ewkt);
        let tags: Option<Vec<String>> = patch.tags.as_ref().map(|t| t.iter().cloned().collect());
        let entry_json = serde_json::to_value(entry)?;

        let row = sqlx::query_as::<_, IncidentRow>(concat!(
            "UPDATE incidents SET ",
            "title = COALESCE($2, title), ",
            "location_name = COALESCE($3, location_name), ",
            "location = COALESCE(ST_GeogFromText($4), location), ",
            "description = COALESCE($5, description), ",
            "tags = COALESCE($6, tags), ",
            "audit_trail = audit_trail || jsonb_build_array($7::JSONB), ",
            "updated_at = now() ",
            "WHERE id = $1 ",
            "RETURNING ",
            incident_columns!()
        ))
        .bind(id.into_inner())
        .bind(patch.title.as_deref())
        .bind(patch.location_name.as_deref())
        .bind(location)
        .bind(patch.description.as_deref())
        .bind(tags)
        .bind(&entry_json)
        .fetch_optional(self.pool)
        .await?;

        row.map(Incident::try_from).transpose()
    }

    /// Append `entry` to the incident's trail without touching other fields.
    ///
    /// Returns `false` if no incident has `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn append_audit(&self, id: IncidentId, entry: &AuditEntry) -> Result<bool, DbError> {
        let entry_json = serde_json::to_value(entry)?;
        let result = sqlx::query(
            r"UPDATE incidents
              SET audit_trail = audit_trail || jsonb_build_array($2::JSONB), updated_at = now()
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(&entry_json)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the incident row (its resources cascade).
    ///
    /// Returns `false` if no incident has `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete(&self, id: IncidentId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// A row from the `incidents` table with the location split into
/// longitude/latitude columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncidentRow {
    /// Primary key.
    pub id: Uuid,
    /// Headline.
    pub title: String,
    /// Place name.
    pub location_name: String,
    /// `ST_X` of the location.
    pub longitude: f64,
    /// `ST_Y` of the location.
    pub latitude: f64,
    /// Optional description.
    pub description: Option<String>,
    /// Tag array.
    pub tags: Vec<String>,
    /// Owning identity.
    pub owner_id: String,
    /// Audit trail as a JSON array.
    pub audit_trail: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = DbError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let audit_trail: Vec<AuditEntry> = serde_json::from_value(row.audit_trail)
            .map_err(|e| DbError::CorruptRow(format!("incident {} audit_trail: {e}", row.id)))?;
        Ok(Self {
            id: IncidentId::from(row.id),
            title: row.title,
            location_name: row.location_name,
            location: GeoPoint::new(row.longitude, row.latitude),
            description: row.description,
            tags: row.tags.into_iter().collect::<BTreeSet<_>>(),
            owner_id: row.owner_id,
            audit_trail,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use relief_types::AuditAction;

    use super::*;

    fn row_with_trail(trail: serde_json::Value) -> IncidentRow {
        IncidentRow {
            id: Uuid::now_v7(),
            title: String::from("Flood"),
            location_name: String::from("Manhattan, NYC"),
            longitude: -74.0,
            latitude: 40.7,
            description: None,
            tags: vec![String::from("flood"), String::from("urgent"), String::from("flood")],
            owner_id: String::from("netrunnerX"),
            audit_trail: trail,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_decodes_trail_and_dedupes_tags() {
        let trail = serde_json::json!([
            {"action": "create", "user_id": "netrunnerX", "timestamp": "2026-01-01T00:00:00Z"}
        ]);
        let incident = Incident::try_from(row_with_trail(trail)).unwrap();
        assert_eq!(incident.audit_trail.len(), 1);
        assert_eq!(
            incident.audit_trail.first().map(|e| e.action),
            Some(AuditAction::Create)
        );
        assert_eq!(incident.tags.len(), 2);
        assert_eq!(incident.location, GeoPoint::new(-74.0, 40.7));
    }

    #[test]
    fn malformed_trail_is_a_corrupt_row() {
        let result = Incident::try_from(row_with_trail(serde_json::json!({"not": "an array"})));
        assert!(matches!(result, Err(DbError::CorruptRow(_))));
    }
}
