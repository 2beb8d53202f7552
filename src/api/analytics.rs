//! `/active/analytics`.

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::analytics::{Counts, Dashboard, RoomUtilization, StudentAttendance};

use super::response::{ok, ApiResult};
use super::AppState;

/// Reporting window; defaults to the last 24 hours.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl WindowQuery {
    fn resolve(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or(to - chrono::Duration::hours(24));
        (from, to)
    }
}

pub async fn counts(State(state): State<AppState>) -> ApiResult<Counts> {
    ok(state.engine.analytics.counts(Utc::now()).await?, "Counts retrieved")
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Dashboard> {
    ok(state.engine.analytics.dashboard(Utc::now()).await?, "Dashboard retrieved")
}

pub async fn room_utilization(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(window): Query<WindowQuery>,
) -> ApiResult<RoomUtilization> {
    let now = Utc::now();
    let (from, to) = window.resolve(now);
    let utilization = state.engine.analytics.room_utilization(room_id, from, to, now).await?;
    ok(utilization, "Room utilization retrieved")
}

pub async fn student_attendance(
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
    Query(window): Query<WindowQuery>,
) -> ApiResult<StudentAttendance> {
    let now = Utc::now();
    let (from, to) = window.resolve(now);
    let attendance = state.engine.analytics.student_attendance(student_id, from, to, now).await?;
    ok(attendance, "Attendance retrieved")
}
