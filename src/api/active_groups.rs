//! `/active/groups` and `/active/unclaimed`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::active_group::{
    ActiveGroup, ActiveGroupFilter, ActiveGroupPatch, ActiveGroupWithSupervisors, NewActiveGroup,
};
use crate::models::visit::VisitDisplay;
use crate::{AppError, ErrorKind};

use super::auth::Caller;
use super::display::{ActiveGroupView, SupervisorView};
use super::response::{body, created, ok, ApiResult};
use super::AppState;

/// Body of `POST /active/groups`.
#[derive(Debug, Deserialize)]
pub struct CreateActiveGroupRequest {
    /// Activity group to run.
    pub template_group_id: i64,
    /// Room to occupy.
    pub room_id: i64,
    /// Defaults to now.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Only for backdated sessions.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Query of `POST /active/groups/{id}/claim`.
#[derive(Debug, Default, Deserialize)]
pub struct ClaimQuery {
    /// Defaults to `supervisor`.
    #[serde(default)]
    pub role: Option<String>,
}

async fn views(state: &AppState, groups: Vec<ActiveGroup>) -> Vec<ActiveGroupView> {
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        out.push(ActiveGroupView::load(&state.directory, group).await);
    }
    out
}

/// `GET /active/groups?active=&room_id=`
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ActiveGroupFilter>,
) -> ApiResult<Vec<ActiveGroupView>> {
    let groups = state.engine.groups.list(filter, Utc::now()).await?;
    ok(views(&state, groups).await, "Active groups retrieved")
}

/// `POST /active/groups`
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateActiveGroupRequest>, JsonRejection>,
) -> ApiResult<ActiveGroupView> {
    let req = body(payload)?;
    let now = Utc::now();
    let group = NewActiveGroup {
        template_group_id: req.template_group_id,
        room_id: req.room_id,
        start_time: req.start_time.unwrap_or(now),
        end_time: req.end_time,
    };

    let created_group = state.engine.groups.create(group, now).await?;
    created(
        ActiveGroupView::load(&state.directory, created_group).await,
        "Active group created",
    )
}

/// `GET /active/groups/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ActiveGroupView> {
    let group = state.engine.groups.get(id).await?;
    ok(ActiveGroupView::load(&state.directory, group).await, "Active group retrieved")
}

/// `PUT /active/groups/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ActiveGroupPatch>, JsonRejection>,
) -> ApiResult<ActiveGroupView> {
    let patch = body(payload)?;
    let group = state.engine.groups.update(id, patch, Utc::now()).await?;
    ok(ActiveGroupView::load(&state.directory, group).await, "Active group updated")
}

/// `DELETE /active/groups/{id}`
pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.engine.groups.delete(id).await?;
    ok((), "Active group deleted")
}

/// `POST /active/groups/{id}/end`
pub async fn end(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ActiveGroupView> {
    let group = state.engine.groups.end(id, Utc::now()).await?;
    ok(ActiveGroupView::load(&state.directory, group).await, "Active group ended")
}

/// `POST /active/groups/{id}/claim?role=`
///
/// Only staff may claim; the caller's staff id becomes the supervisor.
pub async fn claim(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ClaimQuery>,
) -> ApiResult<SupervisorView> {
    let staff_id = caller.require_staff()?;
    let claimed = state
        .engine
        .supervision
        .claim(id, staff_id, query.role.as_deref(), Utc::now())
        .await
        .map_err(|err| {
            if err.is(ErrorKind::StaffNotFound) {
                AppError::Forbidden("staff record required".into())
            } else {
                err
            }
        })?;
    created(SupervisorView::load(&state.directory, claimed).await, "Group claimed")
}

/// `GET /active/groups/{id}/visits`
///
/// Visible only to staff currently supervising the group.
pub async fn visits(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<VisitDisplay>> {
    let staff_id = caller.require_staff()?;
    let now = Utc::now();
    state.engine.groups.get(id).await?;
    if !state.engine.supervision.can_view_group(staff_id, id, now).await? {
        return Err(AppError::Forbidden("not supervising this group".into()));
    }

    let visits = state.engine.visits.get_with_display_data(id).await?;
    ok(visits, "Visits retrieved")
}

/// `GET /active/groups/{id}/supervisors`
pub async fn supervisors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ActiveGroupWithSupervisors> {
    let group = state.engine.groups.get_with_supervisors(id).await?;
    ok(group, "Supervisors retrieved")
}

/// `GET /active/unclaimed`
pub async fn unclaimed(State(state): State<AppState>) -> ApiResult<Vec<ActiveGroupView>> {
    let groups = state.engine.groups.list_unclaimed(Utc::now()).await?;
    ok(views(&state, groups).await, "Unclaimed groups retrieved")
}
