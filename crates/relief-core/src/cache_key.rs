//! Deterministic cache keys.
//!
//! Every key the service caches under is built here, so the set of key
//! shapes is closed and each shape has one namespace prefix that mutation
//! paths can invalidate as a whole.

use std::collections::BTreeMap;

use relief_types::{GeoPoint, IncidentFilter};

/// A cache key produced from a logical query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Namespace of incident list queries.
    pub const INCIDENTS_PREFIX: &'static str = "incidents:";

    /// Namespace of radius queries.
    pub const NEARBY_PREFIX: &'static str = "resources:nearby:";

    /// Key of the aggregated official-updates feed.
    pub const OFFICIAL_UPDATES: &'static str = "feeds:official-updates";

    /// Key for an incident list query.
    ///
    /// The filter is rendered as JSON with keys in sorted order, so two
    /// filters with the same present fields always share a key.
    pub fn incidents(filter: &IncidentFilter) -> Self {
        let mut fields: BTreeMap<&'static str, String> = BTreeMap::new();
        if let Some(id) = filter.id {
            fields.insert("id", id.to_string());
        }
        if let Some(owner_id) = &filter.owner_id {
            fields.insert("owner_id", owner_id.clone());
        }
        if let Some(title) = &filter.title {
            fields.insert("title", title.clone());
        }
        if let Some(location_name) = &filter.location_name {
            fields.insert("location_name", location_name.clone());
        }
        let canonical = serde_json::to_string(&fields).unwrap_or_default();
        Self(format!("{}{canonical}", Self::INCIDENTS_PREFIX))
    }

    /// Key for a radius query around `center`.
    ///
    /// Coordinates are fixed at 7 decimals (about 1 cm) and the radius at
    /// 3, so equal queries written with different float spellings share
    /// a key.
    pub fn nearby(center: &GeoPoint, radius_m: f64) -> Self {
        Self(format!(
            "{}{},{},{}",
            Self::NEARBY_PREFIX,
            fixed(center.longitude, 7),
            fixed(center.latitude, 7),
            fixed(radius_m, 3),
        ))
    }

    /// Key of the aggregated official-updates feed.
    pub fn official_updates() -> Self {
        Self(Self::OFFICIAL_UPDATES.to_owned())
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format `value` with `decimals` places, rendering negative zero as zero.
fn fixed(value: f64, decimals: usize) -> String {
    let rendered = format!("{value:.decimals$}");
    let is_zero = rendered
        .trim_start_matches('-')
        .chars()
        .all(|c| c == '0' || c == '.');
    if is_zero {
        rendered.trim_start_matches('-').to_owned()
    } else {
        rendered
    }
}
