//! In-memory repository for unit testing and local development.
//!
//! Rows live in ordered maps behind a read-write lock; ids are handed out by
//! atomic counters starting at 1, matching the auto-increment behavior of the
//! database backends.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::api::{AllocationId, ProjectorId, TeamId, TimeSlotId};
use crate::db::models::{AllocatedSlotRecord, AllocationRecord, NewTimeSlot, TimeSlotRecord};
use crate::db::repository::{
    ErrorContext, RepositoryError, RepositoryResult, SchedulingRepository,
};

#[derive(Default)]
struct LocalState {
    time_slots: BTreeMap<i64, TimeSlotRecord>,
    allocations: BTreeMap<i64, AllocationRecord>,
}

impl LocalState {
    fn join(&self, allocation: &AllocationRecord) -> Option<AllocatedSlotRecord> {
        let slot = self.time_slots.get(&allocation.time_slot.value())?;
        Some(AllocatedSlotRecord {
            allocation: allocation.id,
            projector: allocation.projector,
            time_slot: allocation.time_slot,
            team: allocation.team,
            start: slot.start,
            duration_minutes: slot.duration_minutes,
            recur_every_minutes: slot.recur_every_minutes,
            recur_end: slot.recur_end,
        })
    }
}

/// In-memory implementation of the storage gateway.
pub struct LocalRepository {
    state: RwLock<LocalState>,
    next_time_slot_id: AtomicI64,
    next_allocation_id: AtomicI64,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LocalState::default()),
            next_time_slot_id: AtomicI64::new(1),
            next_allocation_id: AtomicI64::new(1),
        }
    }

    /// Number of stored time slot rows.
    pub fn time_slot_count(&self) -> usize {
        self.state.read().time_slots.len()
    }

    /// Number of stored allocation rows.
    pub fn allocation_count(&self) -> usize {
        self.state.read().allocations.len()
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulingRepository for LocalRepository {
    async fn load_allocations_for_year(
        &self,
        year_start: DateTime<Utc>,
        year_end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<AllocatedSlotRecord>> {
        let state = self.state.read();
        Ok(state
            .allocations
            .values()
            .filter_map(|allocation| state.join(allocation))
            .filter(|record| {
                let in_window = record.start >= year_start && record.start < year_end;
                in_window || record.is_recurring()
            })
            .collect())
    }

    async fn insert_time_slot(&self, slot: &NewTimeSlot) -> RepositoryResult<TimeSlotId> {
        let id = TimeSlotId::new(self.next_time_slot_id.fetch_add(1, Ordering::SeqCst));
        let record = TimeSlotRecord {
            id,
            start: slot.start,
            duration_minutes: slot.duration_minutes,
            recur_every_minutes: slot.recur_every_minutes,
            recur_end: slot.recur_end,
        };
        self.state.write().time_slots.insert(id.value(), record);
        Ok(id)
    }

    async fn insert_allocation(
        &self,
        projector: ProjectorId,
        time_slot: TimeSlotId,
        team: TeamId,
    ) -> RepositoryResult<AllocationId> {
        let id = AllocationId::new(self.next_allocation_id.fetch_add(1, Ordering::SeqCst));
        let record = AllocationRecord {
            id,
            projector,
            time_slot,
            team,
        };
        self.state.write().allocations.insert(id.value(), record);
        Ok(id)
    }

    async fn find_allocation(
        &self,
        id: AllocationId,
    ) -> RepositoryResult<Option<AllocatedSlotRecord>> {
        let state = self.state.read();
        Ok(state
            .allocations
            .get(&id.value())
            .and_then(|allocation| state.join(allocation)))
    }

    async fn delete_allocation(&self, id: AllocationId) -> RepositoryResult<()> {
        if self.state.write().allocations.remove(&id.value()).is_none() {
            return Err(
                RepositoryError::not_found(format!("allocation {} does not exist", id.value()))
                    .with_context(
                        ErrorContext::new("delete_allocation")
                            .with_target(format!("allocation {}", id.value())),
                    ),
            );
        }
        Ok(())
    }

    async fn delete_time_slot(&self, id: TimeSlotId) -> RepositoryResult<()> {
        if self.state.write().time_slots.remove(&id.value()).is_none() {
            return Err(
                RepositoryError::not_found(format!("time slot {} does not exist", id.value()))
                    .with_context(
                        ErrorContext::new("delete_time_slot")
                            .with_target(format!("time_slot {}", id.value())),
                    ),
            );
        }
        Ok(())
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}
