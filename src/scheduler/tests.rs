//! Behavior tests for the scheduling engine over the in-memory repository.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::api::{
    AllocationId, ProjectorId, Recurrence, RequestOutcome, SlotRequest, TeamId, TimeSlotId,
    UpdateOutcome,
};
use crate::db::models::{AllocatedSlotRecord, NewTimeSlot};
use crate::db::repositories::LocalRepository;
use crate::db::repository::{RepositoryError, RepositoryResult, SchedulingRepository};
use crate::models::time::YearTimeline;

use super::engine::{EngineConfig, SchedulerEngine};

const DAY_MINS: i64 = 24 * 60;

fn timeline() -> YearTimeline {
    YearTimeline::anchored_at(Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap())
}

fn at(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, month, day, hour, minute, 0).unwrap()
}

fn one_off(start: DateTime<Utc>, duration_minutes: i64, team: i64) -> SlotRequest {
    SlotRequest {
        start,
        duration_minutes,
        recurrence: None,
        team: TeamId::new(team),
    }
}

fn recurring(
    start: DateTime<Utc>,
    duration_minutes: i64,
    every_minutes: i64,
    until: DateTime<Utc>,
    team: i64,
) -> SlotRequest {
    SlotRequest {
        start,
        duration_minutes,
        recurrence: Some(Recurrence {
            every_minutes,
            until,
        }),
        team: TeamId::new(team),
    }
}

async fn engine_with(repo: Arc<dyn SchedulingRepository>) -> SchedulerEngine {
    SchedulerEngine::bootstrap_at(repo, EngineConfig::default(), timeline())
        .await
        .unwrap()
}

async fn engine() -> SchedulerEngine {
    engine_with(Arc::new(LocalRepository::new())).await
}

fn reserved(outcome: RequestOutcome) -> crate::api::AllocatedSlot {
    match outcome {
        RequestOutcome::Reserved(slot) => slot,
        other => panic!("expected a reserved slot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_assigns_projectors_in_ascending_order() {
    let engine = engine().await;
    let request = one_off(at(7, 7, 12, 0), 60, 1);

    for expected in 0..3 {
        let slot = reserved(engine.request_slot(&request).await.unwrap());
        assert_eq!(slot.projector, ProjectorId::new(expected));
        assert!(!slot.is_suggestion());
    }
}

#[tokio::test]
async fn test_allocation_ids_are_sequential() {
    let engine = engine().await;
    let request = one_off(at(7, 7, 12, 0), 60, 1);

    let first = reserved(engine.request_slot(&request).await.unwrap());
    let second = reserved(engine.request_slot(&request).await.unwrap());
    assert_eq!(first.allocation, Some(AllocationId::new(1)));
    assert_eq!(second.allocation, Some(AllocationId::new(2)));
}

#[tokio::test]
async fn test_back_to_back_bookings_share_a_projector() {
    let engine = engine().await;

    let morning = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 10, 0), 60, 1))
            .await
            .unwrap(),
    );
    let noon = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 11, 0), 60, 2))
            .await
            .unwrap(),
    );
    // The first booking ends exactly when the second starts.
    assert_eq!(morning.projector, ProjectorId::new(0));
    assert_eq!(noon.projector, ProjectorId::new(0));

    // Adjacent windows surface as one merged schedule entry.
    let schedule = engine.schedule_of(ProjectorId::new(0)).await.unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].start, at(7, 7, 10, 0));
    assert_eq!(schedule[0].duration_minutes, 120);
}

#[tokio::test]
async fn test_overlapping_requests_fill_the_pool_then_suggest() {
    let engine = engine().await;

    // Four teams compete for three projectors in overlapping windows.
    let a = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 10, 0), 120, 1))
            .await
            .unwrap(),
    );
    assert_eq!(a.projector, ProjectorId::new(0));

    let b = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 10, 30), 60, 2))
            .await
            .unwrap(),
    );
    assert_eq!(b.projector, ProjectorId::new(1));

    let c = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 11, 10), 50, 3))
            .await
            .unwrap(),
    );
    assert_eq!(c.projector, ProjectorId::new(2));

    // Every projector is taken at 11:00; the earliest minute any of them can
    // host 30 minutes is 11:30, when the second booking ends.
    let outcome = engine
        .request_slot(&one_off(at(7, 7, 11, 0), 30, 4))
        .await
        .unwrap();
    let suggestion = match outcome {
        RequestOutcome::Suggested(slot) => slot,
        other => panic!("expected a suggestion, got {:?}", other),
    };
    assert!(suggestion.is_suggestion());
    assert_eq!(suggestion.request.start, at(7, 7, 11, 30));
    assert_eq!(suggestion.projector, ProjectorId::new(1));

    // Cancelling the first booking frees its projector entirely.
    assert!(engine.cancel(a.allocation.unwrap()).await.unwrap());
    let schedule = engine.schedule_of(ProjectorId::new(0)).await.unwrap();
    assert!(schedule.is_empty());

    let again = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 10, 0), 60, 4))
            .await
            .unwrap(),
    );
    assert_eq!(again.projector, ProjectorId::new(0));
}

#[tokio::test]
async fn test_suggestion_waits_for_first_vacated_projector() {
    let engine = engine().await;

    // Keep all three projectors busy past noon; the first one frees at 12:00.
    engine
        .request_slot(&one_off(at(7, 7, 10, 0), 120, 1))
        .await
        .unwrap();
    engine
        .request_slot(&one_off(at(7, 7, 10, 30), 95, 2))
        .await
        .unwrap();
    engine
        .request_slot(&one_off(at(7, 7, 11, 10), 60, 3))
        .await
        .unwrap();

    let outcome = engine
        .request_slot(&one_off(at(7, 7, 11, 0), 30, 4))
        .await
        .unwrap();
    match outcome {
        RequestOutcome::Suggested(slot) => {
            assert_eq!(slot.request.start, at(7, 7, 12, 0));
            assert_eq!(slot.projector, ProjectorId::new(0));
        }
        other => panic!("expected a suggestion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_suggestion_mutates_nothing() {
    let repo = Arc::new(LocalRepository::new());
    let engine = engine_with(repo.clone()).await;

    for team in 1..=3 {
        engine
            .request_slot(&one_off(at(7, 7, 10, 0), 120, team))
            .await
            .unwrap();
    }
    let slots_before = repo.time_slot_count();
    let mut schedules_before = Vec::new();
    for projector in 0..3 {
        schedules_before.push(
            engine
                .schedule_of(ProjectorId::new(projector))
                .await
                .unwrap(),
        );
    }

    let outcome = engine
        .request_slot(&one_off(at(7, 7, 10, 0), 30, 4))
        .await
        .unwrap();
    let suggestion = match outcome {
        RequestOutcome::Suggested(slot) => slot,
        other => panic!("expected a suggestion, got {:?}", other),
    };
    assert!(suggestion.allocation.is_none());
    assert!(suggestion.time_slot.is_none());
    // Never more than two hours past the requested start.
    assert!(suggestion.request.start <= at(7, 7, 12, 0));

    assert_eq!(repo.time_slot_count(), slots_before);
    for projector in 0..3 {
        let after = engine
            .schedule_of(ProjectorId::new(projector))
            .await
            .unwrap();
        assert_eq!(after, schedules_before[projector as usize]);
    }
}

#[tokio::test]
async fn test_denied_when_nothing_frees_within_two_hours() {
    let engine = engine().await;

    // Three hours of solid occupancy on every projector: even the last
    // candidate minute (119 past the request) cannot fit 30 minutes.
    for team in 1..=3 {
        engine
            .request_slot(&one_off(at(7, 7, 10, 0), 180, team))
            .await
            .unwrap();
    }

    let outcome = engine
        .request_slot(&one_off(at(7, 7, 10, 0), 30, 4))
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::Denied);
}

#[tokio::test]
async fn test_recurring_needs_every_occurrence_free() {
    let engine = engine().await;

    // One conflicting occurrence (July 10th) disqualifies projector 0 for
    // the whole series.
    let blocker = reserved(
        engine
            .request_slot(&one_off(at(7, 10, 12, 0), 60, 1))
            .await
            .unwrap(),
    );
    assert_eq!(blocker.projector, ProjectorId::new(0));

    let series = reserved(
        engine
            .request_slot(&recurring(
                at(7, 7, 12, 0),
                60,
                3 * DAY_MINS,
                at(8, 5, 14, 0),
                2,
            ))
            .await
            .unwrap(),
    );
    assert_eq!(series.projector, ProjectorId::new(1));

    // July 7th through August 3rd, every third day at noon.
    let schedule = engine.schedule_of(ProjectorId::new(1)).await.unwrap();
    assert_eq!(schedule.len(), 10);
    assert_eq!(schedule[0].start, at(7, 7, 12, 0));
    assert_eq!(schedule[9].start, at(8, 3, 12, 0));
    assert!(schedule.iter().all(|w| w.duration_minutes == 60));
}

#[tokio::test]
async fn test_recurring_denied_without_suggestion() {
    let engine = engine().await;

    for team in 1..=3 {
        engine
            .request_slot(&one_off(at(7, 7, 12, 0), 60, team))
            .await
            .unwrap();
    }

    let outcome = engine
        .request_slot(&recurring(
            at(7, 7, 12, 0),
            60,
            3 * DAY_MINS,
            at(8, 5, 14, 0),
            4,
        ))
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::Denied);
}

#[tokio::test]
async fn test_infeasible_recurrence_is_denied() {
    let engine = engine().await;

    // Recurrence end at (or before) the first start expands to nothing.
    let outcome = engine
        .request_slot(&recurring(
            at(7, 7, 12, 0),
            60,
            3 * DAY_MINS,
            at(7, 7, 12, 0),
            1,
        ))
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::Denied);

    let outcome = engine
        .request_slot(&recurring(
            at(7, 7, 12, 0),
            60,
            3 * DAY_MINS,
            at(7, 5, 12, 0),
            1,
        ))
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::Denied);
}

#[tokio::test]
async fn test_cancel_recurring_releases_all_occurrences() {
    let engine = engine().await;

    let series = reserved(
        engine
            .request_slot(&recurring(
                at(7, 7, 12, 0),
                60,
                3 * DAY_MINS,
                at(8, 5, 14, 0),
                2,
            ))
            .await
            .unwrap(),
    );
    assert!(!engine
        .schedule_of(ProjectorId::new(0))
        .await
        .unwrap()
        .is_empty());

    assert!(engine.cancel(series.allocation.unwrap()).await.unwrap());
    assert!(engine
        .schedule_of(ProjectorId::new(0))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cancel_twice_reports_not_found() {
    let engine = engine().await;
    let slot = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 21, 0), 60, 1))
            .await
            .unwrap(),
    );

    let id = slot.allocation.unwrap();
    assert!(engine.cancel(id).await.unwrap());
    assert!(!engine.cancel(id).await.unwrap());
}

#[tokio::test]
async fn test_cancel_unknown_reports_not_found() {
    let engine = engine().await;
    assert!(!engine.cancel(AllocationId::new(42)).await.unwrap());
}

#[tokio::test]
async fn test_update_moves_booking_and_reissues_identity() {
    let engine = engine().await;
    let original = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 9, 0), 60, 1))
            .await
            .unwrap(),
    );
    let old_id = original.allocation.unwrap();

    let outcome = engine
        .update(old_id, &one_off(at(7, 3, 14, 0), 60, 1))
        .await
        .unwrap();
    let moved = match outcome {
        UpdateOutcome::Updated(slot) => slot,
        other => panic!("expected an update, got {:?}", other),
    };
    assert_ne!(moved.allocation, Some(old_id));
    assert_eq!(moved.request.start, at(7, 3, 14, 0));

    let schedule = engine.schedule_of(ProjectorId::new(0)).await.unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].start, at(7, 3, 14, 0));

    // The old identity is gone for good.
    assert!(!engine.cancel(old_id).await.unwrap());
    assert_eq!(
        engine
            .update(old_id, &one_off(at(7, 4, 14, 0), 60, 1))
            .await
            .unwrap(),
        UpdateOutcome::NotFound
    );
}

#[tokio::test]
async fn test_update_between_recurrence_shapes() {
    let engine = engine().await;
    let series = reserved(
        engine
            .request_slot(&recurring(
                at(7, 7, 9, 0),
                60,
                3 * DAY_MINS,
                at(8, 5, 14, 0),
                2,
            ))
            .await
            .unwrap(),
    );

    let outcome = engine
        .update(
            series.allocation.unwrap(),
            &one_off(at(7, 9, 20, 0), 60, 2),
        )
        .await
        .unwrap();
    let moved = match outcome {
        UpdateOutcome::Updated(slot) => slot,
        other => panic!("expected an update, got {:?}", other),
    };
    assert!(!moved.request.is_recurring());

    let schedule = engine.schedule_of(ProjectorId::new(0)).await.unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].start, at(7, 9, 20, 0));
}

#[tokio::test]
async fn test_failed_update_restores_original_occupancy() {
    let repo = Arc::new(LocalRepository::new());
    let engine = engine_with(repo.clone()).await;

    let original = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 10, 0), 60, 1))
            .await
            .unwrap(),
    );
    let old_id = original.allocation.unwrap();

    // Saturate the target window on every projector.
    for team in 2..=4 {
        engine
            .request_slot(&one_off(at(7, 7, 14, 0), 60, team))
            .await
            .unwrap();
    }

    let outcome = engine
        .update(old_id, &one_off(at(7, 7, 14, 0), 60, 1))
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Unavailable);

    // The original window is occupied again on the original projector.
    let schedule = engine.schedule_of(ProjectorId::new(0)).await.unwrap();
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule[0].start, at(7, 7, 10, 0));
    assert_eq!(schedule[0].duration_minutes, 60);

    // The restored booking lives under a fresh identity; the one that was
    // updated away stays invalid.
    assert!(!engine.cancel(old_id).await.unwrap());
    assert_eq!(repo.allocation_count(), 4);
}

#[tokio::test]
async fn test_schedule_of_unknown_projector_is_none() {
    let engine = engine().await;
    assert!(engine.schedule_of(ProjectorId::new(5)).await.is_none());
    assert!(engine.schedule_of(ProjectorId::new(-1)).await.is_none());
}

#[tokio::test]
async fn test_bootstrap_rebuilds_occupancy_from_store() {
    let repo = Arc::new(LocalRepository::new());

    let slot = repo
        .insert_time_slot(&NewTimeSlot {
            start: at(7, 7, 12, 0),
            duration_minutes: 60,
            recur_every_minutes: 0,
            recur_end: at(7, 7, 12, 0),
        })
        .await
        .unwrap();
    repo.insert_allocation(ProjectorId::new(2), slot, TeamId::new(3))
        .await
        .unwrap();

    let slot = repo
        .insert_time_slot(&NewTimeSlot {
            start: at(7, 7, 12, 0),
            duration_minutes: 60,
            recur_every_minutes: 3 * DAY_MINS,
            recur_end: at(8, 5, 14, 0),
        })
        .await
        .unwrap();
    repo.insert_allocation(ProjectorId::new(1), slot, TeamId::new(2))
        .await
        .unwrap();

    let engine = engine_with(repo).await;

    let single = engine.schedule_of(ProjectorId::new(2)).await.unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].start, at(7, 7, 12, 0));

    let series = engine.schedule_of(ProjectorId::new(1)).await.unwrap();
    assert_eq!(series.len(), 10);

    // Projector 0 carried nothing and takes the next noon request.
    let slot = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 12, 0), 60, 1))
            .await
            .unwrap(),
    );
    assert_eq!(slot.projector, ProjectorId::new(0));
}

#[tokio::test]
async fn test_bootstrap_skips_out_of_pool_projectors() {
    let repo = Arc::new(LocalRepository::new());
    let slot = repo
        .insert_time_slot(&NewTimeSlot {
            start: at(7, 7, 12, 0),
            duration_minutes: 60,
            recur_every_minutes: 0,
            recur_end: at(7, 7, 12, 0),
        })
        .await
        .unwrap();
    repo.insert_allocation(ProjectorId::new(7), slot, TeamId::new(1))
        .await
        .unwrap();

    let engine = engine_with(repo).await;
    for projector in 0..3 {
        assert!(engine
            .schedule_of(ProjectorId::new(projector))
            .await
            .unwrap()
            .is_empty());
    }
}

/// Delegates to an in-memory store but injects failures on demand.
struct FlakyRepository {
    inner: LocalRepository,
    fail_allocations: AtomicBool,
    fail_next_time_slot: AtomicBool,
}

impl FlakyRepository {
    fn new(fail_allocations: bool) -> Self {
        Self {
            inner: LocalRepository::new(),
            fail_allocations: AtomicBool::new(fail_allocations),
            fail_next_time_slot: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SchedulingRepository for FlakyRepository {
    async fn load_allocations_for_year(
        &self,
        year_start: DateTime<Utc>,
        year_end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<AllocatedSlotRecord>> {
        self.inner
            .load_allocations_for_year(year_start, year_end)
            .await
    }

    async fn insert_time_slot(&self, slot: &NewTimeSlot) -> RepositoryResult<TimeSlotId> {
        if self.fail_next_time_slot.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::query("injected time slot failure"));
        }
        self.inner.insert_time_slot(slot).await
    }

    async fn insert_allocation(
        &self,
        projector: ProjectorId,
        time_slot: TimeSlotId,
        team: TeamId,
    ) -> RepositoryResult<AllocationId> {
        if self.fail_allocations.load(Ordering::SeqCst) {
            return Err(RepositoryError::query("injected allocation failure"));
        }
        self.inner.insert_allocation(projector, time_slot, team).await
    }

    async fn find_allocation(
        &self,
        id: AllocationId,
    ) -> RepositoryResult<Option<AllocatedSlotRecord>> {
        self.inner.find_allocation(id).await
    }

    async fn delete_allocation(&self, id: AllocationId) -> RepositoryResult<()> {
        self.inner.delete_allocation(id).await
    }

    async fn delete_time_slot(&self, id: TimeSlotId) -> RepositoryResult<()> {
        self.inner.delete_time_slot(id).await
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        self.inner.health_check().await
    }
}

#[tokio::test]
async fn test_update_hit_by_store_failure_restores_occupancy() {
    let repo = Arc::new(FlakyRepository::new(false));
    let engine = engine_with(repo.clone()).await;

    let original = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 10, 0), 60, 1))
            .await
            .unwrap(),
    );
    let old_id = original.allocation.unwrap();

    // The next slot insert fails, killing the re-reservation inside update.
    repo.fail_next_time_slot.store(true, Ordering::SeqCst);
    let result = engine.update(old_id, &one_off(at(7, 7, 14, 0), 60, 1)).await;
    assert!(result.is_err());

    // The booking is back on its projector, under a fresh identity.
    let schedule = engine.schedule_of(ProjectorId::new(0)).await.unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].start, at(7, 7, 10, 0));
    assert!(!engine.cancel(old_id).await.unwrap());
    assert_eq!(repo.inner.allocation_count(), 1);
}

#[tokio::test]
async fn test_store_failure_leaves_occupancy_untouched() {
    let repo = Arc::new(FlakyRepository::new(true));
    let engine = engine_with(repo.clone()).await;

    let result = engine
        .request_slot(&one_off(at(7, 7, 12, 0), 60, 1))
        .await;
    assert!(result.is_err());

    // No occupancy was committed and the half-written slot row was removed.
    for projector in 0..3 {
        assert!(engine
            .schedule_of(ProjectorId::new(projector))
            .await
            .unwrap()
            .is_empty());
    }
    assert_eq!(repo.inner.time_slot_count(), 0);

    // The engine stays usable once the store recovers.
    repo.fail_allocations.store(false, Ordering::SeqCst);
    let slot = reserved(
        engine
            .request_slot(&one_off(at(7, 7, 12, 0), 60, 1))
            .await
            .unwrap(),
    );
    assert_eq!(slot.projector, ProjectorId::new(0));
}
