//! Place-name resolution.
//!
//! [`Geocoder::Nominatim`] queries an OpenStreetMap Nominatim instance
//! (`/search?q=..&format=json&limit=1`, identifying itself with a
//! `User-Agent` as the usage policy requires). [`Geocoder::Static`]
//! answers from a fixed gazetteer for offline runs and tests.

use std::collections::BTreeMap;

use relief_core::config::UpstreamConfig;
use relief_types::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

const SERVICE: &str = "nominatim";

/// A resolved place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    /// Coordinates of the best match.
    pub location: GeoPoint,
    /// Human-readable address of the match.
    pub display_name: String,
}

/// Resolves free-text place names to coordinates.
#[derive(Debug, Clone)]
pub enum Geocoder {
    /// Live Nominatim lookups.
    Nominatim(NominatimClient),
    /// Fixed gazetteer, matched case-insensitively on the whole name.
    Static(Gazetteer),
}

impl Geocoder {
    /// Build the geocoder selected by `config.live`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Request`] if the HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        if config.live {
            Ok(Self::Nominatim(NominatimClient::new(config)?))
        } else {
            Ok(Self::Static(Gazetteer::builtin()))
        }
    }

    /// Best match for `query`, or `None` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if the upstream request fails.
    pub async fn resolve(&self, query: &str) -> Result<Option<Place>, UpstreamError> {
        match self {
            Self::Nominatim(client) => client.search(query).await,
            Self::Static(gazetteer) => Ok(gazetteer.lookup(query)),
        }
    }
}

/// HTTP client for a Nominatim instance.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
}

impl NominatimClient {
    /// Create a client against `config.nominatim_url`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Request`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| UpstreamError::Request {
                service: SERVICE,
                source,
            })?;
        Ok(Self {
            client,
            base_url: config.nominatim_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn search(&self, query: &str) -> Result<Option<Place>, UpstreamError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|source| UpstreamError::Request {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(UpstreamError::Status {
                service: SERVICE,
                status,
                body,
            });
        }

        let hits: Vec<SearchHit> = response.json().await.map_err(|e| UpstreamError::Parse {
            service: SERVICE,
            detail: e.to_string(),
        })?;
        let Some(hit) = hits.into_iter().next() else {
            tracing::debug!(query, "Nominatim returned no match");
            return Ok(None);
        };
        parse_hit(hit).map(Some)
    }
}

fn parse_hit(hit: SearchHit) -> Result<Place, UpstreamError> {
    let coordinate = |field: &str, text: &str| {
        text.trim()
            .parse::<f64>()
            .map_err(|e| UpstreamError::Parse {
                service: SERVICE,
                detail: format!("{field} {text:?}: {e}"),
            })
    };
    let latitude = coordinate("lat", &hit.lat)?;
    let longitude = coordinate("lon", &hit.lon)?;
    Ok(Place {
        location: GeoPoint::new(longitude, latitude),
        display_name: hit.display_name,
    })
}

/// Fixed name-to-place table.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    places: BTreeMap<String, Place>,
}

impl Gazetteer {
    /// A handful of New York City places, enough for demos and tests.
    pub fn builtin() -> Self {
        [
            ("Manhattan, NYC", -74.006, 40.7128, "Manhattan, New York, United States"),
            ("Lower East Side, NYC", -73.9881, 40.7150, "Lower East Side, Manhattan, New York, United States"),
            ("Brooklyn, NYC", -73.9442, 40.6782, "Brooklyn, New York, United States"),
            ("Queens, NYC", -73.7949, 40.7282, "Queens, New York, United States"),
            ("Hoboken, NJ", -74.0324, 40.7440, "Hoboken, Hudson County, New Jersey, United States"),
        ]
        .into_iter()
        .fold(Self::default(), |gazetteer, (name, lon, lat, display)| {
            gazetteer.with_place(name, GeoPoint::new(lon, lat), display)
        })
    }

    /// Add or replace an entry.
    #[must_use]
    pub fn with_place(mut self, name: &str, location: GeoPoint, display_name: &str) -> Self {
        self.places.insert(
            normalize(name),
            Place {
                location,
                display_name: display_name.to_owned(),
            },
        );
        self
    }

    /// Entry for `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Place> {
        self.places.get(&normalize(name)).cloned()
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_lookup_ignores_case_and_spacing() {
        let geocoder = Geocoder::Static(Gazetteer::builtin());
        let place = geocoder.resolve("  manhattan,   nyc ").await.ok().flatten();
        assert_eq!(
            place.map(|p| p.location),
            Some(GeoPoint::new(-74.006, 40.7128))
        );
    }

    #[tokio::test]
    async fn static_miss_is_none() {
        let geocoder = Geocoder::Static(Gazetteer::default());
        let place = geocoder.resolve("Atlantis").await;
        assert!(matches!(place, Ok(None)));
    }

    #[test]
    fn hit_coordinates_are_parsed_longitude_first() {
        let hit = SearchHit {
            lat: String::from("40.7127281"),
            lon: String::from("-74.0060152"),
            display_name: String::from("New York"),
        };
        let place = parse_hit(hit).ok();
        assert_eq!(
            place.map(|p| p.location),
            Some(GeoPoint::new(-74.006_015_2, 40.712_728_1))
        );
    }

    #[test]
    fn malformed_hit_is_a_parse_error() {
        let hit = SearchHit {
            lat: String::from("north"),
            lon: String::from("0"),
            display_name: String::new(),
        };
        assert!(matches!(parse_hit(hit), Err(UpstreamError::Parse { .. })));
    }

    #[test]
    fn offline_config_selects_gazetteer() {
        let config = UpstreamConfig {
            live: false,
            ..UpstreamConfig::default()
        };
        let geocoder = Geocoder::from_config(&config);
        assert!(matches!(geocoder, Ok(Geocoder::Static(_))));
    }
}
