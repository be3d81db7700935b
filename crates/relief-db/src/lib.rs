//! Data layer for the relief coordination service (`PostgreSQL` + `PostGIS`).
//!
//! `PostgreSQL` is the single source of truth for incidents and resources
//! and also hosts the persisted TTL cache table. An in-process
//! [`MemoryStore`] mirrors the same semantics for local runs and tests.
//!
//! # Tables
//!
//! ```text
//! incidents  (id, title, location_name, location geography(Point,4326),
//!             description, tags text[], owner_id, audit_trail jsonb, timestamps)
//! resources  (id, incident_id -> incidents ON DELETE CASCADE, name,
//!             location_name, location geography(Point,4326), resource_type)
//! cache      (key text primary key, value jsonb, expires_at timestamptz)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool, configuration, migrations
//! - [`incident_store`] -- Incident CRUD and atomic audit append
//! - [`resource_store`] -- Resource insert and `ST_DWithin` radius search
//! - [`cache_store`] -- Persisted cache rows
//! - [`memory`] -- In-process store with identical semantics
//! - [`error`] -- Shared error types

pub mod cache_store;
pub mod error;
pub mod incident_store;
pub mod memory;
pub mod postgres;
pub mod resource_store;

// Re-export primary types for convenience.
pub use cache_store::{CacheEntry, CacheStore};
pub use error::DbError;
pub use incident_store::{IncidentRow, IncidentStore};
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use resource_store::{ResourceRow, ResourceStore};
