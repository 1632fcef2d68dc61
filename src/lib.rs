//! # PRS Rust Backend
//!
//! Projector reservation backend for competing teams.
//!
//! This crate provides the Projector Reservation Service (PRS): a pool of
//! interchangeable projectors is allocated to time-bounded booking requests,
//! including recurring ones, with conflict detection and a next-available
//! start-time suggestion when every projector is taken. The backend exposes a
//! REST API via Axum.
//!
//! ## Features
//!
//! - **Conflict Detection**: per-projector occupancy tracking over half-open
//!   minute intervals on a one-year timeline
//! - **Recurring Bookings**: lazy occurrence expansion bounded by the
//!   recurrence end and the year window
//! - **Suggestions**: minute-granular next-available-slot search within a
//!   fixed two-hour look-ahead
//! - **Persistence**: repository pattern with in-memory and Postgres backends
//! - **HTTP API**: RESTful endpoints for booking, cancellation, update, and
//!   schedule queries
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Shared domain types (requests, allocations, outcomes)
//! - [`models`]: Timeline mapping between timestamps and minute-of-year
//! - [`scheduler`]: The scheduling engine and its occupancy indexes
//! - [`db`]: Database operations, repository pattern, and persistence layer
//! - [`http`]: Axum-based HTTP server and request handlers

pub mod api;

pub mod db;
pub mod models;

pub mod scheduler;

#[cfg(feature = "http-server")]
pub mod http;
