//! Combined groups: several sessions supervised as one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::errors::ErrorKind;
use crate::models::combined_group::{
    CombinedGroup, CombinedGroupCreated, CombinedGroupPatch, GroupMapping, MembershipFailure,
};
use crate::persistence::active_group_repo::ActiveGroupRepo;
use crate::persistence::combined_group_repo::CombinedGroupRepo;
use crate::persistence::db::Database;
use crate::{AppError, Result};

use super::found;

/// Coordinates combined groups and their memberships.
#[derive(Clone)]
pub struct CombinedGroupCoordinator {
    combined: CombinedGroupRepo,
    groups: ActiveGroupRepo,
}

impl CombinedGroupCoordinator {
    /// Create a coordinator over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            combined: CombinedGroupRepo::new(Arc::clone(&db)),
            groups: ActiveGroupRepo::new(db),
        }
    }

    /// Create a combined group and try to add each listed session.
    ///
    /// Memberships are attempted independently; a rejected member is
    /// reported in [`CombinedGroupCreated::failed`] and does not undo the
    /// group or the other members.
    ///
    /// # Errors
    ///
    /// `InvalidTimeRange` if `end_time` does not follow `start_time`, or a
    /// storage error creating the group itself.
    #[instrument(skip(self, active_group_ids))]
    pub async fn create(
        &self,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        active_group_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<CombinedGroupCreated> {
        if end_time.is_some_and(|end| end <= start_time) {
            return Err(AppError::active("create_combined_group", ErrorKind::InvalidTimeRange));
        }

        let group = self.combined.create(start_time, end_time).await?;
        info!(combined_group_id = group.id, "combined group created");

        let mut added = Vec::new();
        let mut failed = Vec::new();
        for &active_group_id in active_group_ids {
            match self.add_group(group.id, active_group_id, now).await {
                Ok(mapping) => added.push(mapping),
                Err(error) => {
                    warn!(combined_group_id = group.id, active_group_id, %error, "membership rejected");
                    failed.push(MembershipFailure { active_group_id, error });
                }
            }
        }

        Ok(CombinedGroupCreated { group, added, failed })
    }

    /// Fetch a combined group.
    ///
    /// # Errors
    ///
    /// `CombinedGroupNotFound` if it does not exist.
    pub async fn get(&self, id: i64) -> Result<CombinedGroup> {
        found(
            self.combined.get_by_id(id).await?,
            "get_combined_group",
            ErrorKind::CombinedGroupNotFound,
        )
    }

    /// All combined groups.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self) -> Result<Vec<CombinedGroup>> {
        self.combined.list(None).await
    }

    /// Combined groups running at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<CombinedGroup>> {
        self.combined.list(Some(now)).await
    }

    /// Correct start and/or end.
    ///
    /// An ended combination keeps its end.
    ///
    /// # Errors
    ///
    /// `CombinedGroupNotFound`, `InvalidTimeRange`,
    /// `CombinedGroupAlreadyEnded` for an end-time patch on an ended
    /// combination, or `GroupAlreadyInCombination` if a member belongs to
    /// another running combination.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: CombinedGroupPatch, now: DateTime<Utc>) -> Result<CombinedGroup> {
        const OP: &str = "update_combined_group";

        let current = self.get(id).await?;
        let start_time = patch.start_time.unwrap_or(current.start_time);
        let end_time = patch.end_time.or(current.end_time);
        if end_time.is_some_and(|end| end <= start_time) {
            return Err(AppError::active(OP, ErrorKind::InvalidTimeRange));
        }
        if patch.end_time.is_some() && !current.is_active(now) {
            return Err(AppError::active(OP, ErrorKind::CombinedGroupAlreadyEnded));
        }

        if !self
            .combined
            .update_if_members_free(id, start_time, patch.end_time, now)
            .await?
        {
            let latest = self.get(id).await?;
            if patch.end_time.is_some() && !latest.is_active(now) {
                return Err(AppError::active(OP, ErrorKind::CombinedGroupAlreadyEnded));
            }
            warn!(combined_group_id = id, "member already in another running combination");
            return Err(AppError::active(OP, ErrorKind::GroupAlreadyInCombination));
        }

        info!(combined_group_id = id, "combined group updated");
        self.get(id).await
    }

    /// End a running combined group at `now`.
    ///
    /// # Errors
    ///
    /// `CombinedGroupNotFound` or `CombinedGroupAlreadyEnded`.
    #[instrument(skip(self))]
    pub async fn end(&self, id: i64, now: DateTime<Utc>) -> Result<CombinedGroup> {
        let current = self.get(id).await?;
        if !current.is_active(now) || !self.combined.end_if_open(id, now).await? {
            return Err(AppError::active("end_combined_group", ErrorKind::CombinedGroupAlreadyEnded));
        }
        info!(combined_group_id = id, "combined group ended");
        self.get(id).await
    }

    /// Delete a combined group and its mappings.
    ///
    /// # Errors
    ///
    /// `CombinedGroupNotFound` if it does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.combined.delete(id).await? {
            return Err(AppError::active("delete_combined_group", ErrorKind::CombinedGroupNotFound));
        }
        info!(combined_group_id = id, "combined group deleted");
        Ok(())
    }

    /// Add a session to a running combined group.
    ///
    /// # Errors
    ///
    /// `CombinedGroupNotFound`, `CombinedGroupAlreadyEnded`,
    /// `ActiveGroupNotFound`, `ActiveGroupAlreadyEnded`, or
    /// `GroupAlreadyInCombination` when the session already belongs to this
    /// or another running combination.
    #[instrument(skip(self))]
    pub async fn add_group(
        &self,
        combined_group_id: i64,
        active_group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<GroupMapping> {
        const OP: &str = "add_group_to_combination";

        let combined = found(
            self.combined.get_by_id(combined_group_id).await?,
            OP,
            ErrorKind::CombinedGroupNotFound,
        )?;
        if !combined.is_active(now) {
            return Err(AppError::active(OP, ErrorKind::CombinedGroupAlreadyEnded));
        }
        self.require_running_session(OP, active_group_id, now).await?;

        let Some(mapping) = self
            .combined
            .add_mapping_if_free(combined_group_id, active_group_id, now)
            .await?
        else {
            self.require_running_session(OP, active_group_id, now).await?;
            return Err(AppError::active(OP, ErrorKind::GroupAlreadyInCombination));
        };

        info!(mapping_id = mapping.id, "group added to combination");
        Ok(mapping)
    }

    async fn require_running_session(&self, op: &'static str, active_group_id: i64, now: DateTime<Utc>) -> Result<()> {
        let group = found(
            self.groups.get_by_id(active_group_id).await?,
            op,
            ErrorKind::ActiveGroupNotFound,
        )?;
        if !group.is_active(now) {
            return Err(AppError::active(op, ErrorKind::ActiveGroupAlreadyEnded));
        }
        Ok(())
    }

    /// Remove a session from a combined group.
    ///
    /// # Errors
    ///
    /// `GroupMappingNotFound` if the session is not a member.
    #[instrument(skip(self))]
    pub async fn remove_group(&self, combined_group_id: i64, active_group_id: i64) -> Result<()> {
        if !self.combined.remove_mapping(combined_group_id, active_group_id).await? {
            return Err(AppError::active(
                "remove_group_from_combination",
                ErrorKind::GroupMappingNotFound,
            ));
        }
        info!(combined_group_id, active_group_id, "group removed from combination");
        Ok(())
    }

    /// Memberships of a combined group.
    ///
    /// # Errors
    ///
    /// `CombinedGroupNotFound` if it does not exist.
    pub async fn mappings(&self, combined_group_id: i64) -> Result<Vec<GroupMapping>> {
        self.get(combined_group_id).await?;
        self.combined.mappings(combined_group_id).await
    }
}
