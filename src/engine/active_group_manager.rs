//! Active group lifecycle: create, update, end, delete.
//!
//! Ending a group does not close its visits or supervisions. They stay
//! open until individually ended; read models count such visits as stale.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::errors::ErrorKind;
use crate::models::active_group::{
    ActiveGroup, ActiveGroupFilter, ActiveGroupPatch, ActiveGroupWithSupervisors,
    ActiveGroupWithVisits, NewActiveGroup,
};
use crate::models::visit::VisitFilter;
use crate::persistence::active_group_repo::ActiveGroupRepo;
use crate::persistence::db::Database;
use crate::persistence::supervisor_repo::SupervisorRepo;
use crate::persistence::visit_repo::VisitRepo;
use crate::{AppError, Result};

use super::found;

/// Governs creation, update and termination of room sessions.
#[derive(Clone)]
pub struct ActiveGroupManager {
    groups: ActiveGroupRepo,
    visits: VisitRepo,
    supervisors: SupervisorRepo,
}

impl ActiveGroupManager {
    /// Create a manager over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            groups: ActiveGroupRepo::new(Arc::clone(&db)),
            visits: VisitRepo::new(Arc::clone(&db)),
            supervisors: SupervisorRepo::new(db),
        }
    }

    /// Open a session in a room.
    ///
    /// The session stays open-ended unless `end_time` is supplied for a
    /// backdated record.
    ///
    /// # Errors
    ///
    /// `InvalidTimeRange` if the end precedes the start, `RoomConflict` if
    /// the room hosts an unterminated overlapping session.
    #[instrument(skip(self, group), fields(room_id = group.room_id, template_group_id = group.template_group_id))]
    pub async fn create(&self, group: NewActiveGroup, now: DateTime<Utc>) -> Result<ActiveGroup> {
        if group.end_time.is_some_and(|end| end <= group.start_time) {
            return Err(AppError::active("create_active_group", ErrorKind::InvalidTimeRange));
        }

        let Some(created) = self.groups.create_if_room_free(&group, now).await? else {
            warn!(room_id = group.room_id, "room already occupied");
            return Err(AppError::active("create_active_group", ErrorKind::RoomConflict));
        };

        info!(active_group_id = created.id, "active group created");
        Ok(created)
    }

    /// Fetch a session.
    ///
    /// # Errors
    ///
    /// `ActiveGroupNotFound` if it does not exist.
    pub async fn get(&self, id: i64) -> Result<ActiveGroup> {
        found(
            self.groups.get_by_id(id).await?,
            "get_active_group",
            ErrorKind::ActiveGroupNotFound,
        )
    }

    /// List sessions matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, filter: ActiveGroupFilter, now: DateTime<Utc>) -> Result<Vec<ActiveGroup>> {
        self.groups.list(filter, now).await
    }

    /// Apply a room move and/or end-time correction.
    ///
    /// Both changes land in one statement. An ended session keeps its end.
    ///
    /// # Errors
    ///
    /// `ActiveGroupNotFound`, `InvalidTimeRange`, `ActiveGroupAlreadyEnded`
    /// for an end-time patch on an ended session, or `RoomConflict` when the
    /// resulting session would overlap another running one in its room.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: ActiveGroupPatch, now: DateTime<Utc>) -> Result<ActiveGroup> {
        const OP: &str = "update_active_group";

        let current = self.get(id).await?;
        if patch.end_time.is_some_and(|end| end <= current.start_time) {
            return Err(AppError::active(OP, ErrorKind::InvalidTimeRange));
        }
        if patch.end_time.is_some() && !current.is_active(now) {
            return Err(AppError::active(OP, ErrorKind::ActiveGroupAlreadyEnded));
        }

        let room_id = patch.room_id.unwrap_or(current.room_id);
        if !self.groups.update_if_room_free(id, room_id, patch.end_time, now).await? {
            let latest = self.get(id).await?;
            if patch.end_time.is_some() && !latest.is_active(now) {
                return Err(AppError::active(OP, ErrorKind::ActiveGroupAlreadyEnded));
            }
            warn!(active_group_id = id, room_id, "room already occupied");
            return Err(AppError::active(OP, ErrorKind::RoomConflict));
        }

        info!(active_group_id = id, "active group updated");
        self.get(id).await
    }

    /// End a running session at `now`.
    ///
    /// A second call fails and keeps the first end time.
    ///
    /// # Errors
    ///
    /// `ActiveGroupNotFound`, or `ActiveGroupAlreadyEnded` if the session
    /// already has an end at or before `now`.
    #[instrument(skip(self))]
    pub async fn end(&self, id: i64, now: DateTime<Utc>) -> Result<ActiveGroup> {
        let current = self.get(id).await?;
        if !current.is_active(now) || !self.groups.end_if_open(id, now).await? {
            return Err(AppError::active("end_active_group", ErrorKind::ActiveGroupAlreadyEnded));
        }

        let open_visits = self.visits.count_open(Some(id)).await?;
        if open_visits > 0 {
            warn!(active_group_id = id, open_visits, "active group ended with open visits");
        }

        info!(active_group_id = id, "active group ended");
        self.get(id).await
    }

    /// Delete a session together with its closed visits and assignments.
    ///
    /// # Errors
    ///
    /// `ActiveGroupNotFound`, or `CannotDeleteActiveGroup` while any of its
    /// visits is open. Supervisors never block deletion.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.get(id).await?;
        if !self.groups.delete_if_no_open_visits(id).await? {
            return Err(AppError::active("delete_active_group", ErrorKind::CannotDeleteActiveGroup));
        }

        info!(active_group_id = id, "active group deleted");
        Ok(())
    }

    /// Session with all its visits.
    ///
    /// # Errors
    ///
    /// `ActiveGroupNotFound` if it does not exist.
    pub async fn get_with_visits(&self, id: i64) -> Result<ActiveGroupWithVisits> {
        let group = self.get(id).await?;
        let visits = self
            .visits
            .list(VisitFilter {
                active_group_id: Some(id),
                ..VisitFilter::default()
            })
            .await?;
        Ok(ActiveGroupWithVisits { group, visits })
    }

    /// Session with all its supervisor assignments.
    ///
    /// # Errors
    ///
    /// `ActiveGroupNotFound` if it does not exist.
    pub async fn get_with_supervisors(&self, id: i64) -> Result<ActiveGroupWithSupervisors> {
        let group = self.get(id).await?;
        let supervisors = self.supervisors.list(Some(id), None).await?;
        Ok(ActiveGroupWithSupervisors { group, supervisors })
    }

    /// Running sessions nobody supervises yet.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_unclaimed(&self, now: DateTime<Utc>) -> Result<Vec<ActiveGroup>> {
        self.groups.list_unclaimed(now).await
    }
}
