//! The scheduling engine: projector selection, booking lifecycle, and
//! suggestion search.
//!
//! One engine instance owns the occupancy indexes for the whole projector
//! pool. Every mutating operation (reserve, cancel, update) runs inside a
//! single async mutex so the sequence "check every projector, persist the
//! records, commit the interval" is atomic with respect to other writers.
//! Persistence calls are bounded by a timeout; a store failure aborts the
//! in-flight operation and leaves the in-memory indexes exactly as they were.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::api::{
    AllocatedSlot, AllocationId, BookedWindow, ProjectorId, RequestOutcome, SlotRequest,
    UpdateOutcome,
};
use crate::db::models::{AllocatedSlotRecord, NewTimeSlot};
use crate::db::repository::{RepositoryError, RepositoryResult, SchedulingRepository};
use crate::models::time::YearTimeline;

use super::occupancy::OccupancyIndex;
use super::recurrence::Occurrences;

/// How far past the requested start the suggestion search scans, in minutes.
pub const SUGGESTION_PERIOD_MINS: i64 = 120;

/// Default projector pool size.
pub const DEFAULT_PROJECTOR_COUNT: usize = 3;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of interchangeable projectors in the pool.
    pub projector_count: usize,
    /// Upper bound for any single persistence call.
    pub persistence_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            projector_count: DEFAULT_PROJECTOR_COUNT,
            persistence_timeout: Duration::from_secs(5),
        }
    }
}

/// Allocates projectors to booking requests and keeps the per-projector
/// occupancy in sync with the persistent store.
pub struct SchedulerEngine {
    repository: Arc<dyn SchedulingRepository>,
    timeline: YearTimeline,
    config: EngineConfig,
    indexes: Mutex<Vec<OccupancyIndex>>,
}

impl SchedulerEngine {
    /// Build an engine for the current calendar year, rebuilding occupancy
    /// from the persisted allocations.
    pub async fn bootstrap(
        repository: Arc<dyn SchedulingRepository>,
        config: EngineConfig,
    ) -> RepositoryResult<Self> {
        Self::bootstrap_at(repository, config, YearTimeline::current_year()).await
    }

    /// Build an engine on an explicit timeline. Intended for tests and tools
    /// that pin the year anchor.
    pub async fn bootstrap_at(
        repository: Arc<dyn SchedulingRepository>,
        config: EngineConfig,
        timeline: YearTimeline,
    ) -> RepositoryResult<Self> {
        let load = repository.load_allocations_for_year(timeline.anchor(), timeline.year_end());
        let records = match tokio::time::timeout(config.persistence_timeout, load).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RepositoryError::timeout(
                    "loading persisted allocations timed out",
                )
                .with_operation("load_allocations_for_year"))
            }
        };

        let mut indexes = vec![OccupancyIndex::new(); config.projector_count];
        for record in &records {
            let projector = record.projector.value();
            if projector < 0 || projector as usize >= indexes.len() {
                warn!(
                    "skipping allocation {}: projector {} is outside the configured pool",
                    record.allocation.value(),
                    projector
                );
                continue;
            }
            for (start, end) in occupied_windows(&timeline, record) {
                indexes[projector as usize].reserve(start, end);
            }
        }
        info!(
            "rebuilt {} projector indexes from {} persisted allocations",
            config.projector_count,
            records.len()
        );

        Ok(Self {
            repository,
            timeline,
            config,
            indexes: Mutex::new(indexes),
        })
    }

    /// The persistence backend this engine writes through.
    pub fn repository(&self) -> &Arc<dyn SchedulingRepository> {
        &self.repository
    }

    pub fn projector_count(&self) -> usize {
        self.config.projector_count
    }

    /// Handle a booking request end to end.
    ///
    /// Tries to reserve a projector; when none is free, non-recurring
    /// requests fall back to the suggestion search. Recurring requests that
    /// cannot be placed are denied outright.
    pub async fn request_slot(&self, request: &SlotRequest) -> RepositoryResult<RequestOutcome> {
        let mut indexes = self.indexes.lock().await;
        if let Some(slot) = self.reserve_locked(&mut indexes, request).await? {
            return Ok(RequestOutcome::Reserved(slot));
        }
        if !request.is_recurring() {
            if let Some(suggestion) = self.suggest_next(&indexes, request) {
                return Ok(RequestOutcome::Suggested(suggestion));
            }
        }
        Ok(RequestOutcome::Denied)
    }

    /// Cancel a booking. Returns `false` when the allocation id is unknown,
    /// which is the expected signal for an already-cancelled booking.
    pub async fn cancel(&self, id: AllocationId) -> RepositoryResult<bool> {
        let mut indexes = self.indexes.lock().await;
        self.cancel_locked(&mut indexes, id).await
    }

    /// Move a booking to a new request.
    ///
    /// The existing booking is cancelled and the new request reserved through
    /// the regular path, so a successful update carries a fresh allocation id
    /// and the old id is permanently invalidated. When the new request cannot
    /// be placed, the original booking is re-reserved (also under a fresh id)
    /// and the caller is told the update failed.
    pub async fn update(
        &self,
        id: AllocationId,
        new_request: &SlotRequest,
    ) -> RepositoryResult<UpdateOutcome> {
        let mut indexes = self.indexes.lock().await;

        let existing = self
            .persist("find_allocation", self.repository.find_allocation(id))
            .await?;
        let Some(existing) = existing else {
            return Ok(UpdateOutcome::NotFound);
        };
        let original = existing.to_request();

        if !self.cancel_locked(&mut indexes, id).await? {
            return Ok(UpdateOutcome::NotFound);
        }

        match self.reserve_locked(&mut indexes, new_request).await {
            Ok(Some(slot)) => Ok(UpdateOutcome::Updated(slot)),
            Ok(None) => {
                self.restore_original(&mut indexes, id, &original).await;
                Ok(UpdateOutcome::Unavailable)
            }
            Err(err) => {
                self.restore_original(&mut indexes, id, &original).await;
                Err(err)
            }
        }
    }

    /// Re-reserve the booking an update released. The interval was vacated by
    /// the preceding cancel, so this is expected to succeed; a store that is
    /// failing can still leave the booking lost, which is logged.
    async fn restore_original(
        &self,
        indexes: &mut Vec<OccupancyIndex>,
        id: AllocationId,
        original: &SlotRequest,
    ) {
        match self.reserve_locked(indexes, original).await {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => warn!(
                "could not restore allocation {} after a failed update",
                id.value()
            ),
        }
    }

    /// Merged occupied windows of one projector, or `None` for an id outside
    /// the pool.
    pub async fn schedule_of(&self, projector: ProjectorId) -> Option<Vec<BookedWindow>> {
        let id = projector.value();
        if id < 0 || id as usize >= self.config.projector_count {
            return None;
        }
        let indexes = self.indexes.lock().await;
        Some(
            indexes[id as usize]
                .snapshot()
                .into_iter()
                .map(|(start, end)| BookedWindow {
                    start: self.timeline.instant_for_minute(start),
                    duration_minutes: end - start,
                })
                .collect(),
        )
    }

    async fn reserve_locked(
        &self,
        indexes: &mut Vec<OccupancyIndex>,
        request: &SlotRequest,
    ) -> RepositoryResult<Option<AllocatedSlot>> {
        let start = self.timeline.minute_of_year(request.start);
        let end = start + request.duration_minutes;

        let chosen = match &request.recurrence {
            None => first_free(indexes, start, end),
            Some(rule) => {
                let until = self.timeline.minute_of_year(rule.until);
                let mut windows =
                    Occurrences::new(start, request.duration_minutes, rule.every_minutes, until);
                if windows.next().is_none() {
                    // Nothing to book: the rule expands to no occurrence
                    // inside the year window.
                    None
                } else {
                    first_free_recurring(
                        indexes,
                        start,
                        request.duration_minutes,
                        rule.every_minutes,
                        until,
                    )
                }
            }
        };
        let Some(projector_idx) = chosen else {
            debug!(
                "no projector free for request of team {} starting minute {}",
                request.team.value(),
                start
            );
            return Ok(None);
        };
        let projector = ProjectorId::new(projector_idx as i64);

        let new_slot = NewTimeSlot::from_request(request);
        let time_slot = self
            .persist("insert_time_slot", self.repository.insert_time_slot(&new_slot))
            .await?;
        let allocation = match self
            .persist(
                "insert_allocation",
                self.repository
                    .insert_allocation(projector, time_slot, request.team),
            )
            .await
        {
            Ok(id) => id,
            Err(err) => {
                // Roll back the half-written slot record so the store does
                // not accumulate orphans.
                if let Err(cleanup) = self
                    .persist("delete_time_slot", self.repository.delete_time_slot(time_slot))
                    .await
                {
                    warn!(
                        "failed to roll back time slot {} after allocation error: {}",
                        time_slot.value(),
                        cleanup
                    );
                }
                return Err(err);
            }
        };

        // The store accepted the booking; now commit the occupancy.
        match &request.recurrence {
            None => indexes[projector_idx].reserve(start, end),
            Some(rule) => {
                let until = self.timeline.minute_of_year(rule.until);
                for (s, e) in
                    Occurrences::new(start, request.duration_minutes, rule.every_minutes, until)
                {
                    indexes[projector_idx].reserve(s, e);
                }
            }
        }
        debug!(
            "reserved projector {} for team {} (allocation {})",
            projector_idx,
            request.team.value(),
            allocation.value()
        );

        Ok(Some(AllocatedSlot {
            allocation: Some(allocation),
            projector,
            time_slot: Some(time_slot),
            request: request.clone(),
        }))
    }

    async fn cancel_locked(
        &self,
        indexes: &mut Vec<OccupancyIndex>,
        id: AllocationId,
    ) -> RepositoryResult<bool> {
        let record = self
            .persist("find_allocation", self.repository.find_allocation(id))
            .await?;
        let Some(record) = record else {
            return Ok(false);
        };

        let projector = record.projector.value();
        if projector < 0 || projector as usize >= indexes.len() {
            return Err(RepositoryError::internal(format!(
                "allocation {} references projector {} outside the configured pool",
                id.value(),
                projector
            )));
        }

        let windows = occupied_windows(&self.timeline, &record);
        let index = &mut indexes[projector as usize];
        for &(start, end) in &windows {
            index.release(start, end);
        }

        let deleted = async {
            self.persist("delete_allocation", self.repository.delete_allocation(id))
                .await?;
            self.persist(
                "delete_time_slot",
                self.repository.delete_time_slot(record.time_slot),
            )
            .await
        }
        .await;
        if let Err(err) = deleted {
            // Put the released occupancy back so a failed delete leaves the
            // pool exactly as it was.
            for &(start, end) in &windows {
                index.reserve(start, end);
            }
            return Err(err);
        }

        debug!("cancelled allocation {}", id.value());
        Ok(true)
    }

    /// Scan candidate start minutes from the requested start, one minute at a
    /// time, for up to [`SUGGESTION_PERIOD_MINS`]. Returns the first
    /// candidate some projector could host for the full duration, packaged as
    /// an uncommitted suggestion. Nothing is persisted or reserved.
    fn suggest_next(
        &self,
        indexes: &[OccupancyIndex],
        request: &SlotRequest,
    ) -> Option<AllocatedSlot> {
        let start = self.timeline.minute_of_year(request.start);
        for offset in 0..SUGGESTION_PERIOD_MINS {
            let candidate = start + offset;
            if let Some(projector_idx) =
                first_free(indexes, candidate, candidate + request.duration_minutes)
            {
                let shifted = SlotRequest {
                    start: self.timeline.instant_for_minute(candidate),
                    ..request.clone()
                };
                return Some(AllocatedSlot {
                    allocation: None,
                    projector: ProjectorId::new(projector_idx as i64),
                    time_slot: None,
                    request: shifted,
                });
            }
        }
        None
    }

    async fn persist<T>(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = RepositoryResult<T>>,
    ) -> RepositoryResult<T> {
        match tokio::time::timeout(self.config.persistence_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RepositoryError::timeout("persistence call timed out")
                .with_operation(operation)),
        }
    }
}

/// First projector, in ascending id order, with no conflict for the window.
fn first_free(indexes: &[OccupancyIndex], start: i64, end: i64) -> Option<usize> {
    indexes.iter().position(|index| !index.intersects(start, end))
}

/// First projector on which *every* occurrence of the rule is conflict-free.
/// A single conflicting occurrence disqualifies the projector entirely.
fn first_free_recurring(
    indexes: &[OccupancyIndex],
    start: i64,
    duration: i64,
    every: i64,
    until: i64,
) -> Option<usize> {
    indexes.iter().position(|index| {
        Occurrences::new(start, duration, every, until).all(|(s, e)| !index.intersects(s, e))
    })
}

/// Minute windows a persisted booking occupies on its projector.
fn occupied_windows(timeline: &YearTimeline, record: &AllocatedSlotRecord) -> Vec<(i64, i64)> {
    let start = timeline.minute_of_year(record.start);
    if record.is_recurring() {
        let until = timeline.minute_of_year(record.recur_end);
        Occurrences::new(start, record.duration_minutes, record.recur_every_minutes, until)
            .collect()
    } else {
        vec![(start, start + record.duration_minutes)]
    }
}
