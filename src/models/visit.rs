//! Visit model: a student's check-in/check-out record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A student's presence in an active group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Visit {
    /// Unique record identifier.
    pub id: i64,
    /// Student who checked in.
    pub student_id: i64,
    /// Session the student checked into.
    pub active_group_id: i64,
    /// Check-in instant.
    pub entry_time: DateTime<Utc>,
    /// Check-out instant; absent while the student is present.
    pub exit_time: Option<DateTime<Utc>>,
    /// Staff member who performed the check-in, if any.
    pub checked_in_by: Option<i64>,
}

impl Visit {
    /// Whether the student is still checked in.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.exit_time.is_none()
    }
}

/// Input for a check-in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NewVisit {
    /// Student checking in.
    pub student_id: i64,
    /// Target session.
    pub active_group_id: i64,
    /// Check-in instant.
    pub entry_time: DateTime<Utc>,
    /// Staff member performing the check-in.
    #[serde(default)]
    pub checked_in_by: Option<i64>,
}

/// Mutable fields of a visit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct VisitPatch {
    /// Corrected check-in instant.
    #[serde(default)]
    pub entry_time: Option<DateTime<Utc>>,
    /// Corrected check-out instant.
    #[serde(default)]
    pub exit_time: Option<DateTime<Utc>>,
}

/// Listing filter for visits.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct VisitFilter {
    /// `Some(true)` keeps open visits, `Some(false)` closed ones.
    #[serde(default)]
    pub active: Option<bool>,
    /// Restrict to one student.
    #[serde(default)]
    pub student_id: Option<i64>,
    /// Restrict to one session.
    #[serde(default)]
    pub active_group_id: Option<i64>,
}

/// A visit joined with the data needed to render it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisitDisplay {
    /// The visit itself.
    #[serde(flatten)]
    pub visit: Visit,
    /// Student full name.
    pub student_name: Option<String>,
    /// Student school class.
    pub school_class: Option<String>,
    /// Label of the session's activity group.
    pub group_label: String,
    /// Room name.
    pub room_name: Option<String>,
}
