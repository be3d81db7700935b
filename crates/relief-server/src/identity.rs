//! Mock caller identity.
//!
//! The caller names themselves with the `x-mock-user` header or the
//! `user` query parameter. Names on the fixed roster keep their role;
//! anything else (or nothing) resolves to the guest identity. Identity is
//! used for audit attribution only; no endpoint checks roles.

use core::convert::Infallible;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use relief_types::GUEST_ACTOR;
use serde::{Deserialize, Serialize};

/// Header carrying the mock username.
pub const MOCK_USER_HEADER: &str = "x-mock-user";

/// Role attached to a roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full operator.
    Admin,
    /// Field contributor.
    Contributor,
    /// Unrecognised caller.
    Guest,
}

const ROSTER: [(&str, Role); 4] = [
    ("netrunnerX", Role::Admin),
    ("reliefAdmin", Role::Admin),
    ("citizen1", Role::Contributor),
    ("helperNY", Role::Contributor),
];

/// The resolved caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    /// Username recorded in audit entries.
    pub username: String,
    /// Roster role.
    pub role: Role,
}

impl Actor {
    /// The guest identity.
    pub fn guest() -> Self {
        Self {
            username: GUEST_ACTOR.to_owned(),
            role: Role::Guest,
        }
    }

    /// Resolve `name` against the roster.
    pub fn resolve(name: Option<&str>) -> Self {
        name.and_then(|name| ROSTER.iter().find(|(known, _)| *known == name))
            .map_or_else(Self::guest, |(known, role)| Self {
                username: (*known).to_owned(),
                role: *role,
            })
    }
}

#[derive(Debug, Deserialize)]
struct UserParam {
    user: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(MOCK_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let name = header.or_else(|| {
            Query::<UserParam>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(param)| param.user)
        });
        Ok(Self::resolve(name.as_deref()))
    }
}
