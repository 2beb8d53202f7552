//! Visit repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::is_unique_violation;
use crate::models::visit::{NewVisit, Visit, VisitDisplay, VisitFilter};
use crate::Result;

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_ts, missing_after_write};

/// Repository wrapper around `SQLite` for visit records.
#[derive(Clone)]
pub struct VisitRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct VisitRow {
    id: i64,
    student_id: i64,
    active_group_id: i64,
    entry_time: String,
    exit_time: Option<String>,
    checked_in_by: Option<i64>,
}

impl VisitRow {
    fn into_visit(self) -> Result<Visit> {
        Ok(Visit {
            id: self.id,
            student_id: self.student_id,
            active_group_id: self.active_group_id,
            entry_time: decode_ts("entry_time", &self.entry_time)?,
            exit_time: decode_opt_ts("exit_time", self.exit_time.as_deref())?,
            checked_in_by: self.checked_in_by,
        })
    }
}

/// Visit joined with student, group and room columns.
#[derive(sqlx::FromRow)]
struct VisitDisplayRow {
    id: i64,
    student_id: i64,
    active_group_id: i64,
    entry_time: String,
    exit_time: Option<String>,
    checked_in_by: Option<i64>,
    first_name: Option<String>,
    last_name: Option<String>,
    school_class: Option<String>,
    template_group_id: Option<i64>,
    room_name: Option<String>,
}

impl VisitDisplayRow {
    fn into_display(self) -> Result<VisitDisplay> {
        let student_name = match (self.first_name, self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        };
        let group_label = format!(
            "Group #{}",
            self.template_group_id.unwrap_or(self.active_group_id)
        );
        let visit = VisitRow {
            id: self.id,
            student_id: self.student_id,
            active_group_id: self.active_group_id,
            entry_time: self.entry_time,
            exit_time: self.exit_time,
            checked_in_by: self.checked_in_by,
        }
        .into_visit()?;

        Ok(VisitDisplay {
            visit,
            student_name,
            school_class: self.school_class,
            group_label,
            room_name: self.room_name,
        })
    }
}

impl VisitRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an open visit if the target group is running at `now` and the
    /// student has no other open visit.
    ///
    /// Returns `Ok(None)` when either precondition fails; a lost race on
    /// the open-visit index is reported the same way.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails for another reason.
    pub async fn create_if_student_free(
        &self,
        visit: &NewVisit,
        now: DateTime<Utc>,
    ) -> Result<Option<Visit>> {
        let outcome = sqlx::query(
            "INSERT INTO visit (student_id, active_group_id, entry_time, checked_in_by)
             SELECT ?1, ?2, ?3, ?4
             WHERE NOT EXISTS (
                 SELECT 1 FROM visit WHERE student_id = ?1 AND exit_time IS NULL
             )
               AND EXISTS (
                 SELECT 1 FROM active_group
                 WHERE id = ?2 AND (end_time IS NULL OR end_time > ?5)
             )",
        )
        .bind(visit.student_id)
        .bind(visit.active_group_id)
        .bind(encode_ts(visit.entry_time))
        .bind(visit.checked_in_by)
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await;

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
            .ok_or_else(|| missing_after_write("visit", id))
    }

    /// Retrieve a visit by identifier.
    ///
    /// Returns `Ok(None)` if the visit does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Visit>> {
        let row: Option<VisitRow> = sqlx::query_as("SELECT * FROM visit WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(VisitRow::into_visit).transpose()
    }

    /// Retrieve the student's open visit, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_open_for_student(&self, student_id: i64) -> Result<Option<Visit>> {
        let row: Option<VisitRow> =
            sqlx::query_as("SELECT * FROM visit WHERE student_id = ?1 AND exit_time IS NULL LIMIT 1")
                .bind(student_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(VisitRow::into_visit).transpose()
    }

    /// List visits matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, filter: VisitFilter) -> Result<Vec<Visit>> {
        let rows: Vec<VisitRow> = sqlx::query_as(
            "SELECT * FROM visit
             WHERE (?1 IS NULL OR student_id = ?1)
               AND (?2 IS NULL OR active_group_id = ?2)
               AND (?3 IS NULL
                    OR (?3 = 1 AND exit_time IS NULL)
                    OR (?3 = 0 AND exit_time IS NOT NULL))
             ORDER BY entry_time DESC, id DESC",
        )
        .bind(filter.student_id)
        .bind(filter.active_group_id)
        .bind(filter.active)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(VisitRow::into_visit).collect()
    }

    /// List a group's visits with display data, present students first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_display_for_group(&self, active_group_id: i64) -> Result<Vec<VisitDisplay>> {
        let rows: Vec<VisitDisplayRow> = sqlx::query_as(
            "SELECT v.id, v.student_id, v.active_group_id, v.entry_time, v.exit_time,
                    v.checked_in_by, s.first_name, s.last_name, s.school_class,
                    g.template_group_id, r.name AS room_name
             FROM visit v
             LEFT JOIN student s ON s.id = v.student_id
             LEFT JOIN active_group g ON g.id = v.active_group_id
             LEFT JOIN room r ON r.id = g.room_id
             WHERE v.active_group_id = ?1
             ORDER BY (v.exit_time IS NOT NULL), v.entry_time, v.id",
        )
        .bind(active_group_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(VisitDisplayRow::into_display).collect()
    }

    /// Close a visit that is still open.
    ///
    /// Returns `false` when the visit was already closed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn end_if_open(&self, id: i64, exit_time: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE visit SET exit_time = ?2 WHERE id = ?1 AND exit_time IS NULL")
            .bind(id)
            .bind(encode_ts(exit_time))
            .execute(self.db.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite entry and exit times of a visit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn update_times(
        &self,
        id: i64,
        entry_time: DateTime<Utc>,
        exit_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE visit SET entry_time = ?2, exit_time = ?3 WHERE id = ?1")
            .bind(id)
            .bind(encode_ts(entry_time))
            .bind(exit_time.map(encode_ts))
            .execute(self.db.as_ref())
            .await?;

        Ok(())
    }

    /// Delete a visit.
    ///
    /// Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM visit WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count open visits, optionally within one group.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_open(&self, active_group_id: Option<i64>) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM visit
             WHERE exit_time IS NULL AND (?1 IS NULL OR active_group_id = ?1)",
        )
        .bind(active_group_id)
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(row.0)
    }

    /// Count open visits whose group has ended by `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_stale(&self, now: DateTime<Utc>) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM visit v
             JOIN active_group g ON g.id = v.active_group_id
             WHERE v.exit_time IS NULL
               AND g.end_time IS NOT NULL AND g.end_time <= ?1",
        )
        .bind(encode_ts(now))
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(row.0)
    }

    /// List a student's visits that intersect the window `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_student_between(
        &self,
        student_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Visit>> {
        let rows: Vec<VisitRow> = sqlx::query_as(
            "SELECT * FROM visit
             WHERE student_id = ?1
               AND entry_time < ?3
               AND (exit_time IS NULL OR exit_time > ?2)
             ORDER BY entry_time",
        )
        .bind(student_id)
        .bind(encode_ts(from))
        .bind(encode_ts(to))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(VisitRow::into_visit).collect()
    }
}
