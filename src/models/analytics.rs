//! Read-side projections over sessions and visits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counts {
    /// Running sessions.
    pub active_groups: i64,
    /// Open visits in running sessions.
    pub active_visits: i64,
    /// Open visits whose session has already ended.
    pub stale_visits: i64,
    /// Supervisor assignments in effect.
    pub active_supervisors: i64,
    /// Running sessions without a supervisor.
    pub unclaimed_groups: i64,
    /// Running combined groups.
    pub active_combined_groups: i64,
    /// Scheduled checkouts still pending.
    pub pending_checkouts: i64,
}

/// Current use of one room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomOccupancy {
    /// Room identifier.
    pub room_id: i64,
    /// Room name, when the directory knows it.
    pub room_name: Option<String>,
    /// Session running in the room.
    pub active_group_id: i64,
    /// Students currently checked in.
    pub present_students: i64,
}

/// Counts plus per-room occupancy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dashboard {
    /// Totals.
    #[serde(flatten)]
    pub counts: Counts,
    /// One entry per running session.
    pub rooms: Vec<RoomOccupancy>,
}

/// How long a room hosted sessions within a window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomUtilization {
    /// Room identifier.
    pub room_id: i64,
    /// Window start.
    pub from: DateTime<Utc>,
    /// Window end.
    pub to: DateTime<Utc>,
    /// Sessions intersecting the window.
    pub sessions: usize,
    /// Minutes covered by at least one session.
    pub occupied_minutes: i64,
    /// `occupied_minutes` over the window length, in `[0, 1]`.
    pub utilization: f64,
}

/// A student's presence within a window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentAttendance {
    /// Student identifier.
    pub student_id: i64,
    /// Window start.
    pub from: DateTime<Utc>,
    /// Window end.
    pub to: DateTime<Utc>,
    /// Visits intersecting the window.
    pub visits: usize,
    /// Minutes present within the window.
    pub total_minutes: i64,
    /// Distinct calendar days (UTC) with presence.
    pub days_present: usize,
}
