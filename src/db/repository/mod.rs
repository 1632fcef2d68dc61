//! Storage gateway for time slots and allocations.
//!
//! The engine only ever talks to the store through [`SchedulingRepository`];
//! any backend able to implement these few operations (an in-memory map, an
//! embedded database, a networked one) can serve as the store.

mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{AllocationId, ProjectorId, TeamId, TimeSlotId};
use crate::db::models::{AllocatedSlotRecord, NewTimeSlot};

/// Durable store of time slots and projector allocations.
#[async_trait]
pub trait SchedulingRepository: Send + Sync {
    /// All allocations relevant to the year window: bookings whose first
    /// occurrence starts inside `[year_start, year_end)` plus every recurring
    /// booking regardless of its first-occurrence date. Called once at
    /// engine bootstrap to rebuild occupancy.
    async fn load_allocations_for_year(
        &self,
        year_start: DateTime<Utc>,
        year_end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<AllocatedSlotRecord>>;

    /// Store a time slot row and return its new id.
    async fn insert_time_slot(&self, slot: &NewTimeSlot) -> RepositoryResult<TimeSlotId>;

    /// Store an allocation row and return its new id.
    async fn insert_allocation(
        &self,
        projector: ProjectorId,
        time_slot: TimeSlotId,
        team: TeamId,
    ) -> RepositoryResult<AllocationId>;

    /// Look up an allocation joined with its time slot.
    async fn find_allocation(
        &self,
        id: AllocationId,
    ) -> RepositoryResult<Option<AllocatedSlotRecord>>;

    /// Delete an allocation row. Deleting an unknown id is an error.
    async fn delete_allocation(&self, id: AllocationId) -> RepositoryResult<()>;

    /// Delete a time slot row. Deleting an unknown id is an error.
    async fn delete_time_slot(&self, id: TimeSlotId) -> RepositoryResult<()>;

    /// Cheap liveness probe for health endpoints.
    async fn health_check(&self) -> RepositoryResult<bool>;
}
