//! Persisted record shapes for time slots and allocations.
//!
//! A recurring booking is stored once, as its first occurrence plus the
//! recurrence columns; `recur_every_minutes == 0` marks a one-off booking,
//! in which case `recur_end` carries the start instant and has no meaning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{
    AllocatedSlot, AllocationId, ProjectorId, Recurrence, SlotRequest, TeamId, TimeSlotId,
};

/// A stored time slot row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotRecord {
    pub id: TimeSlotId,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub recur_every_minutes: i64,
    pub recur_end: DateTime<Utc>,
}

/// A stored allocation row binding a projector and team to a time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub id: AllocationId,
    pub projector: ProjectorId,
    pub time_slot: TimeSlotId,
    pub team: TeamId,
}

/// An allocation joined with its time slot, as loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedSlotRecord {
    pub allocation: AllocationId,
    pub projector: ProjectorId,
    pub time_slot: TimeSlotId,
    pub team: TeamId,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub recur_every_minutes: i64,
    pub recur_end: DateTime<Utc>,
}

impl AllocatedSlotRecord {
    pub fn is_recurring(&self) -> bool {
        self.recur_every_minutes > 0
    }

    /// The booking request this record was created from.
    pub fn to_request(&self) -> SlotRequest {
        let recurrence = (self.recur_every_minutes > 0).then_some(Recurrence {
            every_minutes: self.recur_every_minutes,
            until: self.recur_end,
        });
        SlotRequest {
            start: self.start,
            duration_minutes: self.duration_minutes,
            recurrence,
            team: self.team,
        }
    }

    pub fn to_allocated_slot(&self) -> AllocatedSlot {
        AllocatedSlot {
            allocation: Some(self.allocation),
            projector: self.projector,
            time_slot: Some(self.time_slot),
            request: self.to_request(),
        }
    }
}

/// Insert value for a new time slot row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeSlot {
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub recur_every_minutes: i64,
    pub recur_end: DateTime<Utc>,
}

impl NewTimeSlot {
    pub fn from_request(request: &SlotRequest) -> Self {
        match &request.recurrence {
            Some(rule) => Self {
                start: request.start,
                duration_minutes: request.duration_minutes,
                recur_every_minutes: rule.every_minutes,
                recur_end: rule.until,
            },
            None => Self {
                start: request.start,
                duration_minutes: request.duration_minutes,
                recur_every_minutes: 0,
                recur_end: request.start,
            },
        }
    }
}
