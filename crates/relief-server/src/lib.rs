//! HTTP service surface for the relief coordination service.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **REST endpoints** for incidents, their resources, proximity search,
//!   geocoding and official updates
//! - **`WebSocket` endpoint** (`/ws/events`) streaming mutation events
//!   from the core broadcast channel
//!
//! # Architecture
//!
//! Handlers are thin: they check request shape, resolve place names
//! through the [`Geocoder`], attribute the call to the mock [`Actor`],
//! and delegate to [`ReliefService`], which owns caching, persistence,
//! the audit trail and broadcasting. Errors render as
//! `{"error", "message", "status"}` via [`ApiError`].
//!
//! [`Geocoder`]: geocode::Geocoder
//! [`Actor`]: identity::Actor
//! [`ReliefService`]: relief_core::ReliefService
//! [`ApiError`]: error::ApiError

pub mod error;
pub mod feeds;
pub mod geocode;
pub mod handlers;
pub mod identity;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
