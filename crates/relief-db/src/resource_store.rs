//! Resource persistence and radius search.
//!
//! Radius search uses `ST_DWithin` on `geography`, which measures geodesic
//! metres on the WGS84 spheroid and can use the `GiST` index on `location`.

use chrono::{DateTime, Utc};
use relief_types::{GeoPoint, IncidentId, Resource, ResourceDraft, ResourceId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Column list shared by every query that returns a [`ResourceRow`].
macro_rules! resource_columns {
    () => {
        "id, incident_id, name, location_name, \
         ST_X(location::geometry) AS longitude, ST_Y(location::geometry) AS latitude, \
         resource_type, created_at"
    };
}

/// Operations on the `resources` table.
pub struct ResourceStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ResourceStore<'a> {
    /// Create a new resource store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a validated resource and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingReference`] if the incident does not
    /// exist, or [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, draft: &ResourceDraft) -> Result<Resource, DbError> {
        let row = sqlx::query_as::<_, ResourceRow>(concat!(
            "INSERT INTO resources (incident_id, name, location_name, location, resource_type) ",
            "VALUES ($1, $2, $3, ST_GeogFromText($4), $5) ",
            "RETURNING ",
            resource_columns!()
        ))
        .bind(draft.incident_id.into_inner())
        .bind(&draft.name)
        .bind(&draft.location_name)
        .bind(draft.location.to_ewkt())
        .bind(&draft.kind)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, &format!("incident {}", draft.incident_id)))?;

        let resource = Resource::from(row);
        tracing::debug!(id = %resource.id, incident_id = %resource.incident_id, "Inserted resource");
        Ok(resource)
    }

    /// Every resource within `radius_m` metres of `center`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn within(&self, center: &GeoPoint, radius_m: f64) -> Result<Vec<Resource>, DbError> {
        let rows = sqlx::query_as::<_, ResourceRow>(concat!(
            "SELECT ",
            resource_columns!(),
            " FROM resources ",
            "WHERE ST_DWithin(location, ST_GeogFromText($1), $2) ",
            "ORDER BY ST_Distance(location, ST_GeogFromText($1)), id"
        ))
        .bind(center.to_ewkt())
        .bind(radius_m)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Resource::from).collect())
    }
}

/// A row from the `resources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResourceRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning incident.
    pub incident_id: Uuid,
    /// Display name.
    pub name: String,
    /// Place name.
    pub location_name: String,
    /// `ST_X` of the location.
    pub longitude: f64,
    /// `ST_Y` of the location.
    pub latitude: f64,
    /// Classifier.
    pub resource_type: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Self {
            id: ResourceId::from(row.id),
            incident_id: IncidentId::from(row.incident_id),
            name: row.name,
            location_name: row.location_name,
            location: GeoPoint::new(row.longitude, row.latitude),
            kind: row.resource_type,
            created_at: row.created_at,
        }
    }
}
