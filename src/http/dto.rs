//! Data Transfer Objects for the HTTP API.
//!
//! Request bodies are validated here, before the engine is invoked: malformed
//! timestamps are rejected by deserialization, and the recurrence fields are
//! cross-checked in [`AllocationRequest::into_slot_request`]. The engine only
//! ever sees well-formed requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{AllocatedSlot, BookedWindow, Recurrence, SlotRequest, TeamId};

/// Request body for booking (or re-booking) a projector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Start of the (first) occurrence, RFC 3339
    pub start: DateTime<Utc>,
    /// Occurrence length in minutes
    pub duration_minutes: i64,
    /// Gap between occurrence starts in minutes; 0 means non-recurring
    #[serde(default)]
    pub recur_interval_minutes: i64,
    /// Exclusive recurrence end; required when recurring
    #[serde(default)]
    pub recur_end: Option<DateTime<Utc>>,
    /// Requesting team
    pub team_id: i64,
}

impl AllocationRequest {
    /// Validate and convert into a domain request.
    pub fn into_slot_request(self) -> Result<SlotRequest, String> {
        if self.duration_minutes <= 0 {
            return Err("duration_minutes must be positive".to_string());
        }
        if self.recur_interval_minutes < 0 {
            return Err("recur_interval_minutes must not be negative".to_string());
        }

        let recurrence = if self.recur_interval_minutes > 0 {
            let until = self
                .recur_end
                .ok_or_else(|| "recurring requests require recur_end".to_string())?;
            Some(Recurrence {
                every_minutes: self.recur_interval_minutes,
                until,
            })
        } else {
            // A recurrence end on a one-off request is accepted only when it
            // degenerates to the start instant.
            if let Some(end) = self.recur_end {
                if end != self.start {
                    return Err(
                        "non-recurring requests must not carry a recurrence end".to_string()
                    );
                }
            }
            None
        };

        Ok(SlotRequest {
            start: self.start,
            duration_minutes: self.duration_minutes,
            recurrence,
            team: TeamId::new(self.team_id),
        })
    }
}

/// Response body for a committed booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub allocation_id: i64,
    pub projector_id: i64,
    pub time_slot_id: i64,
    pub team_id: i64,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recur_interval_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recur_end: Option<DateTime<Utc>>,
}

impl AllocationResponse {
    /// Build from a committed slot; `None` if the slot lacks identifiers
    /// (i.e. is a suggestion).
    pub fn from_slot(slot: &AllocatedSlot) -> Option<Self> {
        Some(Self {
            allocation_id: slot.allocation?.value(),
            projector_id: slot.projector.value(),
            time_slot_id: slot.time_slot?.value(),
            team_id: slot.request.team.value(),
            start: slot.request.start,
            duration_minutes: slot.request.duration_minutes,
            recur_interval_minutes: slot.request.recurrence.map(|r| r.every_minutes),
            recur_end: slot.request.recurrence.map(|r| r.until),
        })
    }
}

/// Response body for a next-available-slot suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    /// Always true; marks the body as advisory, nothing was booked
    pub suggestion: bool,
    /// First start time at which a projector is free for the full duration
    pub next_available_start: DateTime<Utc>,
    /// Projector that would be chosen at that time
    pub projector_id: i64,
    pub duration_minutes: i64,
}

impl SuggestionResponse {
    pub fn from_slot(slot: &AllocatedSlot) -> Self {
        Self {
            suggestion: true,
            next_available_start: slot.request.start,
            projector_id: slot.projector.value(),
            duration_minutes: slot.request.duration_minutes,
        }
    }
}

/// One occupied window in a schedule response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowDto {
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl From<BookedWindow> for WindowDto {
    fn from(window: BookedWindow) -> Self {
        Self {
            start: window.start,
            duration_minutes: window.duration_minutes,
        }
    }
}

/// Response body for a projector schedule query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub projector_id: i64,
    pub windows: Vec<WindowDto>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}
