//! Group supervisor model: staff assignment to an active group.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role assigned when a group is claimed without an explicit role.
pub const DEFAULT_ROLE: &str = "supervisor";

/// A staff member supervising an active group for an interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GroupSupervisor {
    /// Unique record identifier.
    pub id: i64,
    /// Supervising staff member.
    pub staff_id: i64,
    /// Supervised session.
    pub active_group_id: i64,
    /// Free-form role, e.g. `supervisor`.
    pub role: String,
    /// Start of the assignment.
    pub start_date: DateTime<Utc>,
    /// End of the assignment; absent while ongoing.
    pub end_date: Option<DateTime<Utc>>,
}

impl GroupSupervisor {
    /// Whether the assignment is in effect at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        super::is_open(self.end_date, now)
    }
}

/// Input for a supervisor assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NewGroupSupervisor {
    /// Staff member to assign.
    pub staff_id: i64,
    /// Target session.
    pub active_group_id: i64,
    /// Role within the session.
    #[serde(default = "default_role")]
    pub role: String,
    /// Start of the assignment.
    pub start_date: DateTime<Utc>,
    /// Planned end of the assignment.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

fn default_role() -> String {
    DEFAULT_ROLE.into()
}

/// Mutable fields of a supervisor assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GroupSupervisorPatch {
    /// New role.
    #[serde(default)]
    pub role: Option<String>,
    /// Corrected end.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}
