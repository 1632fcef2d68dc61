//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! scheduling engine for business logic.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::dto::{
    AllocationRequest, AllocationResponse, HealthResponse, ScheduleResponse, SuggestionResponse,
};
use super::error::{ApiError, AppError};
use super::state::AppState;
use crate::api::{AllocationId, ProjectorId, RequestOutcome, UpdateOutcome};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the store is
/// reachable.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.engine.repository().health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Allocation lifecycle
// =============================================================================

/// POST /v1/allocations
///
/// Request a projector for a time slot. Returns the committed booking, or an
/// advisory next-available start time when every projector is taken, or a
/// conflict when neither is possible.
pub async fn request_allocation(
    State(state): State<AppState>,
    Json(body): Json<AllocationRequest>,
) -> Result<Response, AppError> {
    let request = body.into_slot_request().map_err(AppError::BadRequest)?;

    match state.engine.request_slot(&request).await? {
        RequestOutcome::Reserved(slot) => {
            let dto = AllocationResponse::from_slot(&slot)
                .ok_or_else(|| AppError::Internal("reserved slot missing identifiers".into()))?;
            Ok((StatusCode::CREATED, Json(dto)).into_response())
        }
        RequestOutcome::Suggested(slot) => {
            Ok((StatusCode::OK, Json(SuggestionResponse::from_slot(&slot))).into_response())
        }
        RequestOutcome::Denied => Ok((
            StatusCode::CONFLICT,
            Json(ApiError::new(
                "NO_PROJECTOR_AVAILABLE",
                "no projector is free for the requested window",
            )),
        )
            .into_response()),
    }
}

/// DELETE /v1/allocations/{allocation_id}
///
/// Cancel a booking. Cancelling an unknown (or already cancelled) allocation
/// yields 404.
pub async fn cancel_allocation(
    State(state): State<AppState>,
    Path(allocation_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.engine.cancel(AllocationId::new(allocation_id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "allocation {} does not exist",
            allocation_id
        )))
    }
}

/// PUT /v1/allocations/{allocation_id}
///
/// Move a booking to a new time slot. On success the booking gets a fresh
/// allocation id and the old one becomes invalid; on conflict the original
/// booking is kept.
pub async fn update_allocation(
    State(state): State<AppState>,
    Path(allocation_id): Path<i64>,
    Json(body): Json<AllocationRequest>,
) -> Result<Response, AppError> {
    let request = body.into_slot_request().map_err(AppError::BadRequest)?;

    match state
        .engine
        .update(AllocationId::new(allocation_id), &request)
        .await?
    {
        UpdateOutcome::Updated(slot) => {
            let dto = AllocationResponse::from_slot(&slot)
                .ok_or_else(|| AppError::Internal("updated slot missing identifiers".into()))?;
            Ok((StatusCode::OK, Json(dto)).into_response())
        }
        UpdateOutcome::NotFound => Err(AppError::NotFound(format!(
            "allocation {} does not exist",
            allocation_id
        ))),
        UpdateOutcome::Unavailable => Ok((
            StatusCode::CONFLICT,
            Json(ApiError::new(
                "NO_PROJECTOR_AVAILABLE",
                "no projector is free for the updated window; original booking kept",
            )),
        )
            .into_response()),
    }
}

// =============================================================================
// Schedule queries
// =============================================================================

/// GET /v1/projectors/{projector_id}/schedule
///
/// The merged occupied windows of one projector.
pub async fn projector_schedule(
    State(state): State<AppState>,
    Path(projector_id): Path<i64>,
) -> HandlerResult<ScheduleResponse> {
    let windows = state
        .engine
        .schedule_of(ProjectorId::new(projector_id))
        .await
        .ok_or_else(|| AppError::NotFound(format!("projector {} does not exist", projector_id)))?;

    Ok(Json(ScheduleResponse {
        projector_id,
        windows: windows.into_iter().map(Into::into).collect(),
    }))
}
