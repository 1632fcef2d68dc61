//! Projector scheduling engine.
//!
//! The engine keeps one [`occupancy::OccupancyIndex`] per projector and
//! answers booking, cancellation, update, and schedule queries against them.
//! Booking windows live on the minute-of-year axis provided by
//! [`crate::models::time::YearTimeline`]; recurring bookings are expanded
//! lazily by [`recurrence::Occurrences`].
//!
//! All writer operations are serialized behind a single lock so that the
//! check-then-commit sequence can never interleave with another writer and
//! double-book a projector.

pub mod engine;
pub mod occupancy;
pub mod recurrence;

pub use engine::{EngineConfig, SchedulerEngine, SUGGESTION_PERIOD_MINS};
pub use occupancy::OccupancyIndex;
pub use recurrence::Occurrences;

#[cfg(test)]
mod tests;
