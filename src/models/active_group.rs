//! Active group model: a time-boxed occupancy of a room by an activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::supervisor::GroupSupervisor;
use super::visit::Visit;

/// A running or finished room session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ActiveGroup {
    /// Unique record identifier.
    pub id: i64,
    /// Activity group this session instantiates.
    pub template_group_id: i64,
    /// Room hosting the session.
    pub room_id: i64,
    /// Session start.
    pub start_time: DateTime<Utc>,
    /// Session end; absent while the session is open.
    pub end_time: Option<DateTime<Utc>>,
}

impl ActiveGroup {
    /// Whether the session is running at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        super::is_open(self.end_time, now)
    }

    /// Display label used in listings.
    #[must_use]
    pub fn label(&self) -> String {
        format!("Group #{}", self.template_group_id)
    }
}

/// Input for creating an active group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NewActiveGroup {
    /// Activity group being run.
    pub template_group_id: i64,
    /// Room to occupy.
    pub room_id: i64,
    /// Session start.
    pub start_time: DateTime<Utc>,
    /// Explicit end, only for backdated or historical records.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Mutable fields of an active group.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ActiveGroupPatch {
    /// Move the session to another room.
    #[serde(default)]
    pub room_id: Option<i64>,
    /// Correct the session end.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Listing filter for active groups.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct ActiveGroupFilter {
    /// `Some(true)` keeps running sessions, `Some(false)` finished ones.
    #[serde(default)]
    pub active: Option<bool>,
    /// Restrict to one room.
    #[serde(default)]
    pub room_id: Option<i64>,
}

/// An active group together with its visits.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActiveGroupWithVisits {
    /// The session.
    #[serde(flatten)]
    pub group: ActiveGroup,
    /// All visits recorded against it.
    pub visits: Vec<Visit>,
}

/// An active group together with its supervisors.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActiveGroupWithSupervisors {
    /// The session.
    #[serde(flatten)]
    pub group: ActiveGroup,
    /// All supervisor assignments for it.
    pub supervisors: Vec<GroupSupervisor>,
}
