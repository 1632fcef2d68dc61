use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{allocations, time_slots};
use crate::api::{AllocationId, ProjectorId, TeamId, TimeSlotId};
use crate::db::models::{AllocatedSlotRecord, NewTimeSlot};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = time_slots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TimeSlotRow {
    pub id: i64,
    pub start_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub recur_every_minutes: i64,
    pub recur_end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = time_slots)]
pub struct NewTimeSlotRow {
    pub start_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub recur_every_minutes: i64,
    pub recur_end_at: DateTime<Utc>,
}

impl From<&NewTimeSlot> for NewTimeSlotRow {
    fn from(slot: &NewTimeSlot) -> Self {
        Self {
            start_at: slot.start,
            duration_minutes: slot.duration_minutes,
            recur_every_minutes: slot.recur_every_minutes,
            recur_end_at: slot.recur_end,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = allocations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AllocationRow {
    pub id: i64,
    pub projector_id: i64,
    pub time_slot_id: i64,
    pub team_id: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = allocations)]
pub struct NewAllocationRow {
    pub projector_id: i64,
    pub time_slot_id: i64,
    pub team_id: i64,
}

/// Join an allocation row with its time slot row.
pub fn joined_record(allocation: AllocationRow, slot: TimeSlotRow) -> AllocatedSlotRecord {
    AllocatedSlotRecord {
        allocation: AllocationId::new(allocation.id),
        projector: ProjectorId::new(allocation.projector_id),
        time_slot: TimeSlotId::new(allocation.time_slot_id),
        team: TeamId::new(allocation.team_id),
        start: slot.start_at,
        duration_minutes: slot.duration_minutes,
        recur_every_minutes: slot.recur_every_minutes,
        recur_end: slot.recur_end_at,
    }
}
