//! `/active/visits`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::ErrorKind;
use crate::models::visit::{NewVisit, Visit, VisitFilter, VisitPatch};
use crate::AppError;

use super::auth::Caller;
use super::display::VisitView;
use super::response::{body, created, ok, ApiResult};
use super::AppState;

/// Body of `POST /active/visits`.
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub student_id: i64,
    pub active_group_id: i64,
    /// Defaults to now.
    #[serde(default)]
    pub entry_time: Option<DateTime<Utc>>,
}

/// Query of `POST /active/visits/{id}/end`.
#[derive(Debug, Default, Deserialize)]
pub struct CheckOutQuery {
    /// Defaults to now.
    #[serde(default)]
    pub exit_time: Option<DateTime<Utc>>,
}

async fn views(state: &AppState, visits: Vec<Visit>) -> Vec<VisitView> {
    let mut out = Vec::with_capacity(visits.len());
    for visit in visits {
        out.push(VisitView::load(&state.directory, visit).await);
    }
    out
}

pub async fn list(State(state): State<AppState>, Query(filter): Query<VisitFilter>) -> ApiResult<Vec<VisitView>> {
    let visits = state.engine.visits.list(filter).await?;
    ok(views(&state, visits).await, "Visits retrieved")
}

/// Check-in. The caller's staff id, when present, is recorded as
/// `checked_in_by`.
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<CheckInRequest>, JsonRejection>,
) -> ApiResult<VisitView> {
    let req = body(payload)?;
    let now = Utc::now();
    let visit = NewVisit {
        student_id: req.student_id,
        active_group_id: req.active_group_id,
        entry_time: req.entry_time.unwrap_or(now),
        checked_in_by: caller.staff_id,
    };

    let visit = state.engine.visits.check_in(visit, now).await?;
    created(VisitView::load(&state.directory, visit).await, "Student checked in")
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<VisitView> {
    let visit = state.engine.visits.get(id).await?;
    ok(VisitView::load(&state.directory, visit).await, "Visit retrieved")
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<VisitPatch>, JsonRejection>,
) -> ApiResult<VisitView> {
    let patch = body(payload)?;
    let visit = state.engine.visits.update(id, patch).await?;
    ok(VisitView::load(&state.directory, visit).await, "Visit updated")
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.engine.visits.delete(id).await?;
    ok((), "Visit deleted")
}

/// Check-out at `exit_time`, or now.
pub async fn end(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<CheckOutQuery>,
) -> ApiResult<VisitView> {
    let visit = state.engine.visits.check_out(id, query.exit_time, Utc::now()).await?;
    ok(VisitView::load(&state.directory, visit).await, "Student checked out")
}

pub async fn for_student(State(state): State<AppState>, Path(student_id): Path<i64>) -> ApiResult<Vec<VisitView>> {
    let visits = state.engine.visits.list_for_student(student_id).await?;
    ok(views(&state, visits).await, "Visits retrieved")
}

/// 404 when the student is not checked in anywhere.
pub async fn current(State(state): State<AppState>, Path(student_id): Path<i64>) -> ApiResult<VisitView> {
    let Some(visit) = state.engine.visits.get_current_for_student(student_id).await? else {
        return Err(AppError::active("get_current_visit", ErrorKind::VisitNotFound));
    };
    ok(VisitView::load(&state.directory, visit).await, "Current visit retrieved")
}
