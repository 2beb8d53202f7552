//! Staff supervision of active groups, including the claim path for
//! rooms without a device.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::errors::ErrorKind;
use crate::models::supervisor::{GroupSupervisor, GroupSupervisorPatch, NewGroupSupervisor, DEFAULT_ROLE};
use crate::persistence::active_group_repo::ActiveGroupRepo;
use crate::persistence::db::Database;
use crate::persistence::directory_repo::DirectoryRepo;
use crate::persistence::supervisor_repo::SupervisorRepo;
use crate::{AppError, Result};

use super::found;

/// Manages supervisor assignments.
#[derive(Clone)]
pub struct SupervisionManager {
    supervisors: SupervisorRepo,
    groups: ActiveGroupRepo,
    directory: DirectoryRepo,
}

impl SupervisionManager {
    /// Create a manager over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            supervisors: SupervisorRepo::new(Arc::clone(&db)),
            groups: ActiveGroupRepo::new(Arc::clone(&db)),
            directory: DirectoryRepo::new(db),
        }
    }

    /// Assign a staff member to a running session.
    ///
    /// # Errors
    ///
    /// `StaffNotFound`, `ActiveGroupNotFound`, `ActiveGroupAlreadyEnded`,
    /// `InvalidTimeRange`, or `StaffAlreadySupervising` if the pair already
    /// has an assignment in effect.
    #[instrument(skip(self, assignment), fields(staff_id = assignment.staff_id, active_group_id = assignment.active_group_id))]
    pub async fn assign(&self, assignment: &NewGroupSupervisor, now: DateTime<Utc>) -> Result<GroupSupervisor> {
        const OP: &str = "assign_supervisor";

        if assignment.end_date.is_some_and(|end| end <= assignment.start_date) {
            return Err(AppError::active(OP, ErrorKind::InvalidTimeRange));
        }
        if self.directory.get_staff(assignment.staff_id).await?.is_none() {
            return Err(AppError::active(OP, ErrorKind::StaffNotFound));
        }
        self.require_open_group(OP, assignment.active_group_id, now).await?;

        if let Some(created) = self.supervisors.create_if_not_supervising(assignment, now).await? {
            info!(supervisor_id = created.id, "supervisor assigned");
            return Ok(created);
        }

        self.require_open_group(OP, assignment.active_group_id, now).await?;
        Err(AppError::active(OP, ErrorKind::StaffAlreadySupervising))
    }

    /// Claim an unsupervised session.
    ///
    /// Only one of several concurrent claimers wins; the others, and any
    /// claim on a session that already has a supervisor, receive
    /// `StaffAlreadySupervising`.
    ///
    /// # Errors
    ///
    /// `StaffNotFound`, `ActiveGroupNotFound`, `ActiveGroupAlreadyEnded`, or
    /// `StaffAlreadySupervising`.
    #[instrument(skip(self, role))]
    pub async fn claim(
        &self,
        active_group_id: i64,
        staff_id: i64,
        role: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GroupSupervisor> {
        const OP: &str = "claim_group";

        if self.directory.get_staff(staff_id).await?.is_none() {
            return Err(AppError::active(OP, ErrorKind::StaffNotFound));
        }
        self.require_open_group(OP, active_group_id, now).await?;

        let role = role.unwrap_or(DEFAULT_ROLE);
        if let Some(claimed) = self
            .supervisors
            .claim_if_unclaimed(active_group_id, staff_id, role, now)
            .await?
        {
            info!(supervisor_id = claimed.id, "group claimed");
            return Ok(claimed);
        }

        self.require_open_group(OP, active_group_id, now).await?;
        warn!(active_group_id, staff_id, "group already claimed");
        Err(AppError::active(OP, ErrorKind::StaffAlreadySupervising))
    }

    async fn require_open_group(&self, op: &'static str, active_group_id: i64, now: DateTime<Utc>) -> Result<()> {
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

    /// End an assignment at `now`.
    ///
    /// # Errors
    ///
    /// `SupervisorNotFound` or `SupervisionAlreadyEnded`.
    #[instrument(skip(self))]
    pub async fn end(&self, id: i64, now: DateTime<Utc>) -> Result<GroupSupervisor> {
        let current = self.get(id).await?;
        if !current.is_active(now) || !self.supervisors.end_if_open(id, now).await? {
            return Err(AppError::active("end_supervision", ErrorKind::SupervisionAlreadyEnded));
        }
        info!(supervisor_id = id, staff_id = current.staff_id, "supervision ended");
        self.get(id).await
    }

    /// Fetch an assignment.
    ///
    /// # Errors
    ///
    /// `SupervisorNotFound` if it does not exist.
    pub async fn get(&self, id: i64) -> Result<GroupSupervisor> {
        found(
            self.supervisors.get_by_id(id).await?,
            "get_supervisor",
            ErrorKind::SupervisorNotFound,
        )
    }

    /// List assignments, optionally for one session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, active_group_id: Option<i64>) -> Result<Vec<GroupSupervisor>> {
        self.supervisors.list(active_group_id, None).await
    }

    /// All assignments of one staff member.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_staff(&self, staff_id: i64) -> Result<Vec<GroupSupervisor>> {
        self.supervisors.list(None, Some(staff_id)).await
    }

    /// A staff member's assignments in effect at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_active_for_staff(&self, staff_id: i64, now: DateTime<Utc>) -> Result<Vec<GroupSupervisor>> {
        self.supervisors.list_active_for_staff(staff_id, now).await
    }

    /// Change role and/or end date.
    ///
    /// The end date of an assignment that is no longer in effect stays fixed.
    ///
    /// # Errors
    ///
    /// `SupervisorNotFound`, `InvalidTimeRange` if the end does not come
    /// after the start, `SupervisionAlreadyEnded` for an end-date patch on
    /// an ended assignment, or `StaffAlreadySupervising` if another
    /// assignment for the pair is in effect.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: GroupSupervisorPatch, now: DateTime<Utc>) -> Result<GroupSupervisor> {
        const OP: &str = "update_supervisor";

        let current = self.get(id).await?;
        if patch.end_date.is_some_and(|end| end <= current.start_date) {
            return Err(AppError::active(OP, ErrorKind::InvalidTimeRange));
        }
        if patch.end_date.is_some() && !current.is_active(now) {
            return Err(AppError::active(OP, ErrorKind::SupervisionAlreadyEnded));
        }

        let role = patch.role.unwrap_or(current.role);
        if !self
            .supervisors
            .update_if_not_supervising(id, &role, patch.end_date, now)
            .await?
        {
            let latest = self.get(id).await?;
            if patch.end_date.is_some() && !latest.is_active(now) {
                return Err(AppError::active(OP, ErrorKind::SupervisionAlreadyEnded));
            }
            warn!(supervisor_id = id, staff_id = current.staff_id, "pair already supervised");
            return Err(AppError::active(OP, ErrorKind::StaffAlreadySupervising));
        }

        info!(supervisor_id = id, "supervisor updated");
        self.get(id).await
    }

    /// Remove an assignment.
    ///
    /// # Errors
    ///
    /// `SupervisorNotFound` if it does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.supervisors.delete(id).await? {
            return Err(AppError::active("delete_supervisor", ErrorKind::SupervisorNotFound));
        }
        info!(supervisor_id = id, "supervisor deleted");
        Ok(())
    }

    /// Whether `staff_id` currently supervises the session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn can_view_group(&self, staff_id: i64, active_group_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let active = self.supervisors.list_active_for_staff(staff_id, now).await?;
        Ok(active.iter().any(|s| s.active_group_id == active_group_id))
    }
}
