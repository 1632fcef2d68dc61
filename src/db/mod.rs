//! Persistence layer for projector bookings.
//!
//! This module provides abstractions for database operations via the
//! Repository pattern, allowing different storage backends to be swapped
//! easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API, server binary)             │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Scheduling Engine (scheduler::engine)                   │
//! │  - Conflict checks and occupancy bookkeeping             │
//! │  - Reservation / cancellation / update lifecycle         │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Trait (repository) - Abstract Interface      │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────────┐
//!     │ Local (in-memory) │ Postgres      │
//!     └──────────────────────────────────┘
//! ```
//!
//! The module includes:
//! - `repository`: trait definition and error types for the storage gateway
//! - `models`: persisted record shapes and domain conversions
//! - `repositories::local`: in-memory implementation for unit testing and
//!   local development
//! - `repositories::postgres`: Postgres implementation with Diesel ORM
//! - `factory`: factory for creating repository instances
//! - `repo_config`: TOML/environment service configuration

// Feature flag priority: postgres > local.
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod models;
pub mod repo_config;
pub mod repositories;
pub mod repository;

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::ServiceConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::{PostgresConfig, PostgresRepository};
pub use repository::{
    ErrorContext, RepositoryError, RepositoryResult, SchedulingRepository,
};

/// Placeholder so configuration code keeps one signature when the Postgres
/// backend is compiled out.
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}
