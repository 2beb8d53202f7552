//! Student check-in and check-out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::errors::ErrorKind;
use crate::models::visit::{NewVisit, Visit, VisitDisplay, VisitFilter, VisitPatch};
use crate::persistence::active_group_repo::ActiveGroupRepo;
use crate::persistence::db::Database;
use crate::persistence::directory_repo::DirectoryRepo;
use crate::persistence::visit_repo::VisitRepo;
use crate::{AppError, Result};

use super::found;

/// Enforces one open visit per student.
#[derive(Clone)]
pub struct VisitTracker {
    visits: VisitRepo,
    groups: ActiveGroupRepo,
    directory: DirectoryRepo,
}

impl VisitTracker {
    /// Create a tracker over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            visits: VisitRepo::new(Arc::clone(&db)),
            groups: ActiveGroupRepo::new(Arc::clone(&db)),
            directory: DirectoryRepo::new(db),
        }
    }

    /// Check a student into a running session.
    ///
    /// The insert itself re-checks both preconditions, so a concurrent
    /// check-in or group end between the lookups and the write still
    /// yields a domain error rather than a second open visit.
    ///
    /// # Errors
    ///
    /// `StudentNotFound`, `ActiveGroupNotFound`, `ActiveGroupAlreadyEnded`,
    /// or `StudentAlreadyActive` while the student has an open visit.
    #[instrument(skip(self, visit), fields(student_id = visit.student_id, active_group_id = visit.active_group_id))]
    pub async fn check_in(&self, visit: NewVisit, now: DateTime<Utc>) -> Result<Visit> {
        if self.directory.get_student(visit.student_id).await?.is_none() {
            return Err(AppError::active("check_in", ErrorKind::StudentNotFound));
        }
        self.require_open_group(visit.active_group_id, now).await?;

        if let Some(created) = self.visits.create_if_student_free(&visit, now).await? {
            info!(visit_id = created.id, "student checked in");
            return Ok(created);
        }

        // Lost a precondition between the lookup and the insert.
        self.require_open_group(visit.active_group_id, now).await?;
        Err(AppError::active("check_in", ErrorKind::StudentAlreadyActive))
    }

    async fn require_open_group(&self, active_group_id: i64, now: DateTime<Utc>) -> Result<()> {
        let group = found(
            self.groups.get_by_id(active_group_id).await?,
            "check_in",
            ErrorKind::ActiveGroupNotFound,
        )?;
        if !group.is_active(now) {
            return Err(AppError::active("check_in", ErrorKind::ActiveGroupAlreadyEnded));
        }
        Ok(())
    }

    /// Close a visit at `exit_time`, or at `now` when absent.
    ///
    /// # Errors
    ///
    /// `VisitNotFound`, `VisitAlreadyEnded`, or `InvalidTimeRange` when the
    /// exit precedes the entry.
    #[instrument(skip(self))]
    pub async fn check_out(
        &self,
        visit_id: i64,
        exit_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Visit> {
        let visit = self.get(visit_id).await?;
        if !visit.is_active() {
            return Err(AppError::active("check_out", ErrorKind::VisitAlreadyEnded));
        }

        let exit_time = exit_time.unwrap_or(now);
        if exit_time < visit.entry_time {
            return Err(AppError::active("check_out", ErrorKind::InvalidTimeRange));
        }

        if !self.visits.end_if_open(visit_id, exit_time).await? {
            return Err(AppError::active("check_out", ErrorKind::VisitAlreadyEnded));
        }

        info!(visit_id, student_id = visit.student_id, "student checked out");
        self.get(visit_id).await
    }

    /// Close a visit at `now`.
    ///
    /// # Errors
    ///
    /// Same as [`VisitTracker::check_out`].
    pub async fn end(&self, visit_id: i64, now: DateTime<Utc>) -> Result<Visit> {
        self.check_out(visit_id, None, now).await
    }

    /// Fetch a visit.
    ///
    /// # Errors
    ///
    /// `VisitNotFound` if it does not exist.
    pub async fn get(&self, visit_id: i64) -> Result<Visit> {
        found(
            self.visits.get_by_id(visit_id).await?,
            "get_visit",
            ErrorKind::VisitNotFound,
        )
    }

    /// List visits matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, filter: VisitFilter) -> Result<Vec<Visit>> {
        self.visits.list(filter).await
    }

    /// All visits of one student, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<Visit>> {
        self.visits
            .list(VisitFilter {
                student_id: Some(student_id),
                ..VisitFilter::default()
            })
            .await
    }

    /// The student's open visit, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_current_for_student(&self, student_id: i64) -> Result<Option<Visit>> {
        self.visits.get_open_for_student(student_id).await
    }

    /// Correct entry and/or exit time.
    ///
    /// Omitted fields keep their stored value.
    ///
    /// # Errors
    ///
    /// `VisitNotFound`, or `InvalidTimeRange` if the result would exit
    /// before it entered.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, visit_id: i64, patch: VisitPatch) -> Result<Visit> {
        let current = self.get(visit_id).await?;
        let entry_time = patch.entry_time.unwrap_or(current.entry_time);
        let exit_time = patch.exit_time.or(current.exit_time);

        if exit_time.is_some_and(|exit| exit < entry_time) {
            return Err(AppError::active("update_visit", ErrorKind::InvalidTimeRange));
        }

        self.visits.update_times(visit_id, entry_time, exit_time).await?;
        info!(visit_id, "visit updated");
        self.get(visit_id).await
    }

    /// Remove a visit record.
    ///
    /// # Errors
    ///
    /// `VisitNotFound` if it does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, visit_id: i64) -> Result<()> {
        if !self.visits.delete(visit_id).await? {
            return Err(AppError::active("delete_visit", ErrorKind::VisitNotFound));
        }
        info!(visit_id, "visit deleted");
        Ok(())
    }

    /// Visits of a session joined with student, group and room details.
    ///
    /// # Errors
    ///
    /// `ActiveGroupNotFound` if the session does not exist.
    pub async fn get_with_display_data(&self, active_group_id: i64) -> Result<Vec<VisitDisplay>> {
        found(
            self.groups.get_by_id(active_group_id).await?,
            "get_visits_with_display_data",
            ErrorKind::ActiveGroupNotFound,
        )?;
        self.visits.list_display_for_group(active_group_id).await
    }
}
