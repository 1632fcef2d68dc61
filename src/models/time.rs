//! Mapping between absolute timestamps and minutes of the current year.
//!
//! Booking windows are tracked as integer minute offsets on a bounded
//! one-year axis. Minute 0 is midnight, January 1st of the anchor year in the
//! local timezone; the axis ends at `MINUTES_PER_YEAR`.

use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Length of the bookable timeline in minutes (365 days; leap years are a
/// known, accepted approximation).
pub const MINUTES_PER_YEAR: i64 = 525_600;

/// Minute-of-year timeline anchored at the start of a calendar year.
///
/// The anchor is captured once at construction and never persisted. A process
/// restarted after a year rollover therefore maps the same minute offsets to
/// different absolute instants than its predecessor did; the one-year bound
/// is a deliberate design limit, not enforced by this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearTimeline {
    anchor: DateTime<Utc>,
}

impl YearTimeline {
    /// Timeline for the year the local clock is currently in.
    pub fn current_year() -> Self {
        Self::for_year(Local::now().year())
    }

    /// Timeline anchored at local midnight, January 1st of `year`.
    pub fn for_year(year: i32) -> Self {
        let anchor = Local
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self { anchor }
    }

    /// Timeline with an explicit anchor instant. Intended for tests and tools
    /// that need a timezone-independent axis.
    pub fn anchored_at(anchor: DateTime<Utc>) -> Self {
        Self { anchor }
    }

    /// The instant of minute 0.
    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    /// First instant past the bookable axis.
    pub fn year_end(&self) -> DateTime<Utc> {
        self.anchor + Duration::minutes(MINUTES_PER_YEAR)
    }

    /// Minute offset of `instant` from the anchor.
    ///
    /// Values outside `[0, MINUTES_PER_YEAR)` are returned as-is; callers own
    /// the boundary semantics.
    pub fn minute_of_year(&self, instant: DateTime<Utc>) -> i64 {
        (instant - self.anchor).num_minutes()
    }

    /// Absolute instant of a minute offset.
    pub fn instant_for_minute(&self, minute: i64) -> DateTime<Utc> {
        self.anchor + Duration::minutes(minute)
    }
}
