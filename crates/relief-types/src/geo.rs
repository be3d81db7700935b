//! WGS84 point geometry.
//!
//! Points are stored as `geography(Point, 4326)` in `PostGIS` and travel
//! over the wire as `{ "longitude": .., "latitude": .. }`. The store
//! encoding is EWKT (`SRID=4326;POINT(lon lat)`), longitude first.
//!
//! [`GeoPoint::distance_m`] is a haversine great-circle distance on the
//! IUGG mean-radius sphere. `PostGIS` measures on the WGS84 spheroid, so the
//! two agree to within roughly 0.5% -- close enough for the in-process
//! backend and for asserting radius bounds in tests.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::{Validate, ValidationError, ValidationErrors};

/// Spatial reference identifier for WGS84 longitude/latitude.
pub const SRID_WGS84: u32 = 4326;

/// Mean Earth radius in metres (IUGG).
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// A longitude/latitude pair on the WGS84 datum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GeoPoint {
    /// Longitude in decimal degrees, `-180..=180`.
    pub longitude: f64,
    /// Latitude in decimal degrees, `-90..=90`.
    pub latitude: f64,
}

impl GeoPoint {
    /// Build a point without range checks. Use [`Validate::validate`]
    /// before persisting caller-supplied coordinates.
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Encode the point as EWKT for `ST_GeogFromText`.
    pub fn to_ewkt(&self) -> String {
        format!(
            "SRID={SRID_WGS84};POINT({} {})",
            self.longitude, self.latitude
        )
    }

    /// Great-circle distance to `other` in metres.
    pub fn distance_m(&self, other: &Self) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = (other.latitude - self.latitude).to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();
        EARTH_MEAN_RADIUS_M * c
    }
}

impl Validate for GeoPoint {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            errors.add("longitude", out_of_range("longitude must be within -180..=180"));
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            errors.add("latitude", out_of_range("latitude must be within -90..=90"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn out_of_range(message: &'static str) -> ValidationError {
    ValidationError::new("range").with_message(message.into())
}
