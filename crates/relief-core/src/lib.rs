//! Data-access coordination for the relief service.
//!
//! This crate sits between the service surface and the store: a TTL cache
//! in front of the geospatial store, a proximity engine over resource
//! locations, an append-only audit trail on every incident mutation, and
//! a broadcast channel announcing each successful mutation.
//!
//! # Modules
//!
//! - [`backend`] -- [`StoreHandle`], dispatching to `PostgreSQL` or the
//!   in-process tables.
//! - [`entity`] -- Validated incident and resource CRUD.
//! - [`cache`] -- Store-backed TTL cache with fetch-through.
//! - [`cache_key`] -- The closed set of cache key shapes.
//! - [`proximity`] -- Cached radius search.
//! - [`audit`] -- Audit entry stamping and owner resolution.
//! - [`broadcast`] -- Mutation event fan-out.
//! - [`service`] -- [`ReliefService`], composing all of the above.
//! - [`clock`] -- Injectable wall clock.
//! - [`config`] -- Configuration loading from `relief-config.yaml`.
//! - [`error`] -- [`CoreError`] and its stable [`ErrorKind`].
//!
//! [`StoreHandle`]: backend::StoreHandle
//! [`ReliefService`]: service::ReliefService
//! [`CoreError`]: error::CoreError
//! [`ErrorKind`]: error::ErrorKind

pub mod audit;
pub mod backend;
pub mod broadcast;
pub mod cache;
pub mod cache_key;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod proximity;
pub mod service;

pub use backend::StoreHandle;
pub use broadcast::{Broadcaster, EventFilter, Subscription};
pub use cache::{Cached, TtlCache};
pub use cache_key::CacheKey;
pub use clock::Clock;
pub use config::{ConfigError, ReliefConfig, StoreBackend};
pub use error::{CoreError, ErrorKind};
pub use proximity::{DEFAULT_RADIUS_M, ProximityEngine};
pub use service::ReliefService;
