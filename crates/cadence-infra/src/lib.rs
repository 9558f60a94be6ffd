//! # Cadence Infrastructure
//!
//! Concrete implementations of the ports defined in `cadence-core`.
//! This crate contains the post stores and the publishing backends.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory store and simulated publisher
//! - `postgres` - PostgreSQL post store via SeaORM
//! - `auth` - JWT token service
//! - `http-publisher` - Publish to a remote HTTP endpoint via reqwest

pub mod database;
pub mod publisher;

#[cfg(feature = "auth")]
pub mod auth;

// Re-exports - In-Memory
pub use database::InMemoryPostRepository;
pub use publisher::{SimulatedPublisher, SimulatedPublisherConfig};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, DatabaseConnections, PostgresPostRepository};

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtTokenService};

#[cfg(feature = "http-publisher")]
pub use publisher::{HttpPublisher, HttpPublisherConfig};
