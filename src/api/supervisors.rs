//! `/active/supervisors`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::supervisor::{GroupSupervisor, GroupSupervisorPatch, NewGroupSupervisor, DEFAULT_ROLE};

use super::display::SupervisorView;
use super::response::{body, created, ok, ApiResult};
use super::AppState;

/// Body of `POST /active/supervisors`.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub staff_id: i64,
    pub active_group_id: i64,
    #[serde(default)]
    pub role: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Query of `GET /active/supervisors`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active_group_id: Option<i64>,
}

async fn views(state: &AppState, supervisors: Vec<GroupSupervisor>) -> Vec<SupervisorView> {
    let mut out = Vec::with_capacity(supervisors.len());
    for supervisor in supervisors {
        out.push(SupervisorView::load(&state.directory, supervisor).await);
    }
    out
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Vec<SupervisorView>> {
    let supervisors = state.engine.supervision.list(query.active_group_id).await?;
    ok(views(&state, supervisors).await, "Supervisors retrieved")
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<SupervisorView> {
    let req = body(payload)?;
    let now = Utc::now();
    let assignment = NewGroupSupervisor {
        staff_id: req.staff_id,
        active_group_id: req.active_group_id,
        role: req.role.unwrap_or_else(|| DEFAULT_ROLE.into()),
        start_date: req.start_date.unwrap_or(now),
        end_date: req.end_date,
    };

    let supervisor = state.engine.supervision.assign(&assignment, now).await?;
    created(SupervisorView::load(&state.directory, supervisor).await, "Supervisor assigned")
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<SupervisorView> {
    let supervisor = state.engine.supervision.get(id).await?;
    ok(SupervisorView::load(&state.directory, supervisor).await, "Supervisor retrieved")
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<GroupSupervisorPatch>, JsonRejection>,
) -> ApiResult<SupervisorView> {
    let patch = body(payload)?;
    let supervisor = state.engine.supervision.update(id, patch, Utc::now()).await?;
    ok(SupervisorView::load(&state.directory, supervisor).await, "Supervisor updated")
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.engine.supervision.delete(id).await?;
    ok((), "Supervisor deleted")
}

pub async fn end(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<SupervisorView> {
    let supervisor = state.engine.supervision.end(id, Utc::now()).await?;
    ok(SupervisorView::load(&state.directory, supervisor).await, "Supervision ended")
}

pub async fn for_staff(State(state): State<AppState>, Path(staff_id): Path<i64>) -> ApiResult<Vec<SupervisorView>> {
    let supervisors = state.engine.supervision.list_for_staff(staff_id).await?;
    ok(views(&state, supervisors).await, "Supervisors retrieved")
}

pub async fn active_for_staff(
    State(state): State<AppState>,
    Path(staff_id): Path<i64>,
) -> ApiResult<Vec<SupervisorView>> {
    let supervisors = state.engine.supervision.get_active_for_staff(staff_id, Utc::now()).await?;
    ok(views(&state, supervisors).await, "Active supervisions retrieved")
}
