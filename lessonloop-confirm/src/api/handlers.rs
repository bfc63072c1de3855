//! HTTP request handlers
//!
//! REST endpoints for the confirmation workflow. Workflow errors map to
//! HTTP statuses here: NotFound -> 404, InvalidStateTransition -> 409,
//! MissingDeclineReason -> 400, everything else -> 500.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use lessonloop_common::models::{Lesson, RefundIntent};
use lessonloop_common::Error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::refunds;
use crate::services::SweepOutcome;
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct AcknowledgeRequest {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcknowledgeResponse {
    success: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeclineRequest {
    #[serde(default)]
    reason: String,
    suggested_times: Option<Vec<DateTime<Utc>>>,
}

#[derive(Debug, Serialize)]
pub struct DeclineResponse {
    success: bool,
    refund: String,
}

#[derive(Debug, Serialize)]
pub struct UnsettledRefundsResponse {
    refunds: Vec<RefundIntent>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

/// Map a workflow error to its HTTP representation
fn error_response(e: Error) -> ApiError {
    let code = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidStateTransition(_) => StatusCode::CONFLICT,
        Error::MissingDeclineReason(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "lessonloop-confirm".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Teacher Actions
// ============================================================================

/// POST /lessons/:id/acknowledge - Teacher confirms a pending lesson
pub async fn acknowledge_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    body: Option<Json<AcknowledgeRequest>>,
) -> Result<Json<AcknowledgeResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    state
        .service
        .acknowledge(lesson_id, request.message)
        .await
        .map_err(error_response)?;

    Ok(Json(AcknowledgeResponse { success: true }))
}

/// POST /lessons/:id/decline - Teacher declines a pending lesson
///
/// The refund field reports whether the compensating credit already
/// settled or is still queued for reconciliation.
pub async fn decline_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    body: Option<Json<DeclineRequest>>,
) -> Result<Json<DeclineResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let (_lesson, refund_status) = state
        .service
        .decline(lesson_id, &request.reason, request.suggested_times)
        .await
        .map_err(error_response)?;

    Ok(Json(DeclineResponse {
        success: true,
        refund: refund_status.as_str().to_string(),
    }))
}

// ============================================================================
// Lesson Snapshot
// ============================================================================

/// GET /lessons/:id - Lesson snapshot for operators
pub async fn get_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<Lesson>, ApiError> {
    let lesson = crate::db::lessons::get_lesson(&state.db, lesson_id)
        .await
        .map_err(error_response)?;

    Ok(Json(lesson))
}

// ============================================================================
// Escalation Sweep
// ============================================================================

/// POST /sweep - Run the auto-escalation sweep
///
/// Invoked by the external scheduler. Zero transitioned lessons is a
/// valid, non-error outcome.
pub async fn run_sweep(
    State(state): State<AppState>,
) -> Result<Json<SweepOutcome>, ApiError> {
    let outcome = state.service.run_sweep().await.map_err(error_response)?;

    Ok(Json(outcome))
}

// ============================================================================
// Refund Reconciliation
// ============================================================================

/// GET /refunds/unsettled - Refund intents awaiting reconciliation
pub async fn unsettled_refunds(
    State(state): State<AppState>,
) -> Result<Json<UnsettledRefundsResponse>, ApiError> {
    let refunds = refunds::list_unsettled(&state.db)
        .await
        .map_err(error_response)?;

    Ok(Json(UnsettledRefundsResponse { refunds }))
}
