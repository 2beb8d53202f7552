//! Group supervisor repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::is_unique_violation;
use crate::models::supervisor::{GroupSupervisor, NewGroupSupervisor};
use crate::Result;

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_ts, missing_after_write};

/// Repository wrapper around `SQLite` for supervisor assignments.
#[derive(Clone)]
pub struct SupervisorRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SupervisorRow {
    id: i64,
    staff_id: i64,
    active_group_id: i64,
    role: String,
    start_date: String,
    end_date: Option<String>,
}

impl SupervisorRow {
    fn into_supervisor(self) -> Result<GroupSupervisor> {
        Ok(GroupSupervisor {
            id: self.id,
            staff_id: self.staff_id,
            active_group_id: self.active_group_id,
            role: self.role,
            start_date: decode_ts("start_date", &self.start_date)?,
            end_date: decode_opt_ts("end_date", self.end_date.as_deref())?,
        })
    }
}

impl SupervisorRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an assignment if the group is running and the staff member
    /// does not already supervise it.
    ///
    /// Returns `Ok(None)` when either precondition fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails for another reason.
    pub async fn create_if_not_supervising(
        &self,
        assignment: &NewGroupSupervisor,
        now: DateTime<Utc>,
    ) -> Result<Option<GroupSupervisor>> {
        let outcome = sqlx::query(
            "INSERT INTO group_supervisor (staff_id, active_group_id, role, start_date, end_date)
             SELECT ?1, ?2, ?3, ?4, ?5
             WHERE NOT EXISTS (
                 SELECT 1 FROM group_supervisor
                 WHERE staff_id = ?1 AND active_group_id = ?2
                   AND (end_date IS NULL OR end_date > ?6)
             )
               AND EXISTS (
                 SELECT 1 FROM active_group
                 WHERE id = ?2 AND (end_time IS NULL OR end_time > ?6)
             )",
        )
        .bind(assignment.staff_id)
        .bind(assignment.active_group_id)
        .bind(&assignment.role)
        .bind(encode_ts(assignment.start_date))
        .bind(assignment.end_date.map(encode_ts))
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await;

        self.inserted(outcome).await
    }

    /// Insert an assignment only if the group is running and has no active
    /// supervisor at all.
    ///
    /// This is the claim path for deviceless rooms: of several concurrent
    /// claimers exactly one statement inserts a row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails for another reason.
    pub async fn claim_if_unclaimed(
        &self,
        active_group_id: i64,
        staff_id: i64,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<GroupSupervisor>> {
        let outcome = sqlx::query(
            "INSERT INTO group_supervisor (staff_id, active_group_id, role, start_date, end_date)
             SELECT ?1, ?2, ?3, ?4, NULL
             WHERE NOT EXISTS (
                 SELECT 1 FROM group_supervisor
                 WHERE active_group_id = ?2
                   AND (end_date IS NULL OR end_date > ?4)
             )
               AND EXISTS (
                 SELECT 1 FROM active_group
                 WHERE id = ?2 AND (end_time IS NULL OR end_time > ?4)
             )",
        )
        .bind(staff_id)
        .bind(active_group_id)
        .bind(role)
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await;

        self.inserted(outcome).await
    }

    async fn inserted(
        &self,
        outcome: std::result::Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>,
    ) -> Result<Option<GroupSupervisor>> {
        let result = match outcome {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .map(Some)
            .ok_or_else(|| missing_after_write("group supervisor", id))
    }

    /// Retrieve an assignment by identifier.
    ///
    /// Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<GroupSupervisor>> {
        let row: Option<SupervisorRow> =
            sqlx::query_as("SELECT * FROM group_supervisor WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(SupervisorRow::into_supervisor).transpose()
    }

    /// List all assignments, optionally restricted to one group or staff member.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(
        &self,
        active_group_id: Option<i64>,
        staff_id: Option<i64>,
    ) -> Result<Vec<GroupSupervisor>> {
        let rows: Vec<SupervisorRow> = sqlx::query_as(
            "SELECT * FROM group_supervisor
             WHERE (?1 IS NULL OR active_group_id = ?1)
               AND (?2 IS NULL OR staff_id = ?2)
             ORDER BY start_date DESC, id DESC",
        )
        .bind(active_group_id)
        .bind(staff_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(SupervisorRow::into_supervisor).collect()
    }

    /// List a staff member's assignments in effect at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_active_for_staff(
        &self,
        staff_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<GroupSupervisor>> {
        let rows: Vec<SupervisorRow> = sqlx::query_as(
            "SELECT * FROM group_supervisor
             WHERE staff_id = ?1 AND (end_date IS NULL OR end_date > ?2)
             ORDER BY start_date DESC, id DESC",
        )
        .bind(staff_id)
        .bind(encode_ts(now))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(SupervisorRow::into_supervisor).collect()
    }

    /// End an assignment that is still in effect at `now`.
    ///
    /// Returns `false` when it had already ended.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn end_if_open(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE group_supervisor SET end_date = ?2
             WHERE id = ?1 AND (end_date IS NULL OR end_date > ?2)",
        )
        .bind(id)
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Change role and, while the assignment is still in effect, its end.
    ///
    /// An end date is never rewritten on an assignment that ended by `now`,
    /// and an assignment that stays in effect must be the only one for its
    /// staff/group pair. Returns `false` when either condition fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails for another reason.
    pub async fn update_if_not_supervising(
        &self,
        id: i64,
        role: &str,
        end_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            "UPDATE group_supervisor SET role = ?2, end_date = COALESCE(?3, end_date)
             WHERE id = ?1
               AND (?3 IS NULL OR end_date IS NULL OR end_date > ?4)
               AND (
                   (COALESCE(?3, end_date) IS NOT NULL AND COALESCE(?3, end_date) <= ?4)
                   OR NOT EXISTS (
                       SELECT 1 FROM group_supervisor other
                       WHERE other.id != ?1
                         AND other.staff_id = group_supervisor.staff_id
                         AND other.active_group_id = group_supervisor.active_group_id
                         AND (other.end_date IS NULL OR other.end_date > ?4)
                   )
               )",
        )
        .bind(id)
        .bind(role)
        .bind(end_date.map(encode_ts))
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await;

        match outcome {
            Ok(result) => Ok(result.rows_affected() > 0),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete an assignment.
    ///
    /// Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM group_supervisor WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count assignments in effect at `now`, optionally within one group.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_active(&self, active_group_id: Option<i64>, now: DateTime<Utc>) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM group_supervisor
             WHERE (end_date IS NULL OR end_date > ?2)
               AND (?1 IS NULL OR active_group_id = ?1)",
        )
        .bind(active_group_id)
        .bind(encode_ts(now))
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(row.0)
    }
}
