//! Shared domain types for the reservation service.
//!
//! These are the value types exchanged between the HTTP layer, the scheduling
//! engine, and the persistence layer. All of them are plain data with serde
//! support; behavior lives in the [`crate::scheduler`] module.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Allocation identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocationId(pub i64);

/// Projector identifier. Projectors are numbered from zero in the fixed
/// selection order used by the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectorId(pub i64);

/// Time slot record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlotId(pub i64);

/// Team identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl AllocationId {
    pub fn new(value: i64) -> Self {
        AllocationId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl ProjectorId {
    pub fn new(value: i64) -> Self {
        ProjectorId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TimeSlotId {
    pub fn new(value: i64) -> Self {
        TimeSlotId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TeamId {
    pub fn new(value: i64) -> Self {
        TeamId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Recurrence rule attached to a booking request.
///
/// `until` is exclusive: no occurrence starts at or after it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Gap between occurrence starts, in minutes.
    pub every_minutes: i64,
    /// Exclusive upper bound for occurrence starts.
    pub until: DateTime<Utc>,
}

/// A booking request for a single (first) occurrence.
///
/// A recurring booking is described entirely by its first occurrence plus the
/// recurrence rule; later occurrences are derived, never stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRequest {
    /// Start of the (first) occurrence.
    pub start: DateTime<Utc>,
    /// Occurrence length in minutes.
    pub duration_minutes: i64,
    /// Recurrence rule, absent for one-off bookings.
    pub recurrence: Option<Recurrence>,
    /// Requesting team.
    pub team: TeamId,
}

impl SlotRequest {
    /// End of the (first) occurrence.
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(self.duration_minutes)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }
}

/// A booking request bound to a projector.
///
/// A persisted booking carries both the allocation and time-slot record ids.
/// A *suggestion* carries neither: `allocation` is `None`, marking the value
/// as advisory rather than committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedSlot {
    /// Allocation record id; `None` for suggestions.
    pub allocation: Option<AllocationId>,
    /// Projector the slot is (or would be) held on.
    pub projector: ProjectorId,
    /// Underlying time slot record id; `None` for suggestions.
    pub time_slot: Option<TimeSlotId>,
    /// The request this allocation answers.
    pub request: SlotRequest,
}

impl AllocatedSlot {
    pub fn is_suggestion(&self) -> bool {
        self.allocation.is_none()
    }
}

/// Outcome of a top-level booking request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// A projector was reserved and the booking persisted.
    Reserved(AllocatedSlot),
    /// No projector was free; an alternative start time is proposed.
    Suggested(AllocatedSlot),
    /// No projector was free and no alternative could be found.
    Denied,
}

/// Outcome of an allocation update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The booking was moved; it carries a fresh allocation id.
    Updated(AllocatedSlot),
    /// The referenced allocation does not exist (anymore).
    NotFound,
    /// The new window could not be placed; the original booking was restored.
    Unavailable,
}

/// One merged occupied window on a projector's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookedWindow {
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}
