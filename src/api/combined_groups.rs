//! `/active/combined-groups`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::combined_group::{CombinedGroup, CombinedGroupCreated, CombinedGroupPatch, GroupMapping};

use super::response::{body, created, ok, ApiResult};
use super::AppState;

/// Body of `POST /active/combined-groups`.
#[derive(Debug, Deserialize)]
pub struct CreateCombinedGroupRequest {
    /// Defaults to now.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Sessions to add right away.
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

/// Body of `POST /active/combined-groups/{id}/groups`.
#[derive(Debug, Deserialize)]
pub struct AddGroupRequest {
    pub active_group_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RejectedMembership {
    pub active_group_id: i64,
    pub message: String,
}

/// Response of a create: the group plus the outcome of each membership.
#[derive(Debug, Serialize)]
pub struct CombinedGroupCreatedView {
    #[serde(flatten)]
    pub group: CombinedGroup,
    pub mappings: Vec<GroupMapping>,
    pub failed: Vec<RejectedMembership>,
}

impl From<CombinedGroupCreated> for CombinedGroupCreatedView {
    fn from(created: CombinedGroupCreated) -> Self {
        Self {
            group: created.group,
            mappings: created.added,
            failed: created
                .failed
                .into_iter()
                .map(|f| RejectedMembership {
                    active_group_id: f.active_group_id,
                    message: f.error.kind().map_or("membership failed", |k| k.message()).to_owned(),
                })
                .collect(),
        }
    }
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<CombinedGroup>> {
    ok(state.engine.combined.list().await?, "Combined groups retrieved")
}

pub async fn list_active(State(state): State<AppState>) -> ApiResult<Vec<CombinedGroup>> {
    ok(
        state.engine.combined.list_active(Utc::now()).await?,
        "Active combined groups retrieved",
    )
}

/// Partial membership failures still yield `201`; see `failed`.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateCombinedGroupRequest>, JsonRejection>,
) -> ApiResult<CombinedGroupCreatedView> {
    let req = body(payload)?;
    let now = Utc::now();
    let outcome = state
        .engine
        .combined
        .create(req.start_time.unwrap_or(now), req.end_time, &req.group_ids, now)
        .await?;

    let message = if outcome.is_complete() {
        "Combined group created"
    } else {
        "Combined group created with rejected members"
    };
    created(outcome.into(), message)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<CombinedGroup> {
    ok(state.engine.combined.get(id).await?, "Combined group retrieved")
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<CombinedGroupPatch>, JsonRejection>,
) -> ApiResult<CombinedGroup> {
    let patch = body(payload)?;
    ok(state.engine.combined.update(id, patch, Utc::now()).await?, "Combined group updated")
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.engine.combined.delete(id).await?;
    ok((), "Combined group deleted")
}

pub async fn end(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<CombinedGroup> {
    ok(state.engine.combined.end(id, Utc::now()).await?, "Combined group ended")
}

pub async fn mappings(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<GroupMapping>> {
    ok(state.engine.combined.mappings(id).await?, "Mappings retrieved")
}

pub async fn add_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<AddGroupRequest>, JsonRejection>,
) -> ApiResult<GroupMapping> {
    let req = body(payload)?;
    let mapping = state
        .engine
        .combined
        .add_group(id, req.active_group_id, Utc::now())
        .await?;
    created(mapping, "Group added to combination")
}

pub async fn remove_group(
    State(state): State<AppState>,
    Path((id, group_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    state.engine.combined.remove_group(id, group_id).await?;
    ok((), "Group removed from combination")
}
