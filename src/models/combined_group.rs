//! Combined group model: several active groups sharing supervision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A super-session aggregating active groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CombinedGroup {
    /// Unique record identifier.
    pub id: i64,
    /// Combination start.
    pub start_time: DateTime<Utc>,
    /// Combination end; absent while open.
    pub end_time: Option<DateTime<Utc>>,
}

impl CombinedGroup {
    /// Whether the combination is running at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        super::is_open(self.end_time, now)
    }
}

/// Join row placing an active group into a combined group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GroupMapping {
    /// Unique record identifier.
    pub id: i64,
    /// Member session.
    pub active_group_id: i64,
    /// Owning combination.
    pub combined_group_id: i64,
}

/// Mutable fields of a combined group.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CombinedGroupPatch {
    /// Corrected start.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Corrected end.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Membership that could not be added while seeding a combined group.
#[derive(Debug)]
pub struct MembershipFailure {
    /// Active group that was not added.
    pub active_group_id: i64,
    /// Why it was rejected.
    pub error: AppError,
}

/// Outcome of creating a combined group with initial members.
///
/// The group itself always exists once this is returned; individual
/// memberships may have failed and can be retried.
#[derive(Debug)]
pub struct CombinedGroupCreated {
    /// The new combined group.
    pub group: CombinedGroup,
    /// Mappings that were created.
    pub added: Vec<GroupMapping>,
    /// Memberships that were rejected.
    pub failed: Vec<MembershipFailure>,
}

impl CombinedGroupCreated {
    /// Whether every requested membership was added.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
