//! `/checkouts`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::checkout::{NewScheduledCheckout, ProcessDueReport, ScheduledCheckout};

use super::auth::Caller;
use super::response::{body, created, ok, ApiResponse, ApiResult};
use super::AppState;

/// Body of `POST /checkouts`.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub student_id: i64,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Staff only; the caller becomes `scheduled_by`.
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> ApiResult<ScheduledCheckout> {
    let scheduled_by = caller.require_staff()?;
    let req = body(payload)?;
    let checkout = NewScheduledCheckout {
        student_id: req.student_id,
        scheduled_by,
        scheduled_for: req.scheduled_for,
        reason: req.reason,
    };

    let checkout = state.engine.checkouts.schedule(&checkout, Utc::now()).await?;
    created(checkout, "Checkout scheduled")
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ScheduledCheckout> {
    ok(state.engine.checkouts.get(id).await?, "Checkout retrieved")
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<ScheduledCheckout> {
    let cancelled_by = caller.require_staff()?;
    let checkout = state.engine.checkouts.cancel(id, cancelled_by, Utc::now()).await?;
    ok(checkout, "Checkout cancelled")
}

pub async fn for_student(
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> ApiResult<Vec<ScheduledCheckout>> {
    ok(
        state.engine.checkouts.list_for_student(student_id).await?,
        "Checkouts retrieved",
    )
}

pub async fn pending_for_student(
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> ApiResult<Vec<ScheduledCheckout>> {
    ok(
        state.engine.checkouts.pending_for_student(student_id).await?,
        "Pending checkouts retrieved",
    )
}

/// `200` when every item succeeded, `207` on partial failure, `500` when
/// every candidate failed.
pub async fn process_due(State(state): State<AppState>) -> ApiResult<ProcessDueReport> {
    let report = state.engine.checkouts.process_due(Utc::now()).await?;

    let (status, message) = if report.is_total_failure() {
        (StatusCode::INTERNAL_SERVER_ERROR, "All due checkouts failed")
    } else if report.is_partial() {
        (StatusCode::MULTI_STATUS, "Some due checkouts failed")
    } else {
        (StatusCode::OK, "Due checkouts processed")
    };

    Ok((
        status,
        Json(ApiResponse {
            success: report.success,
            data: report,
            message: message.into(),
        }),
    ))
}
