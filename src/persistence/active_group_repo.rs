//! Active group repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::active_group::{ActiveGroup, ActiveGroupFilter, NewActiveGroup};
use crate::models::analytics::RoomOccupancy;
use crate::Result;

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_ts, missing_after_write};

/// Repository wrapper around `SQLite` for active group records.
#[derive(Clone)]
pub struct ActiveGroupRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ActiveGroupRow {
    id: i64,
    template_group_id: i64,
    room_id: i64,
    start_time: String,
    end_time: Option<String>,
}

impl ActiveGroupRow {
    fn into_active_group(self) -> Result<ActiveGroup> {
        Ok(ActiveGroup {
            id: self.id,
            template_group_id: self.template_group_id,
            room_id: self.room_id,
            start_time: decode_ts("start_time", &self.start_time)?,
            end_time: decode_opt_ts("end_time", self.end_time.as_deref())?,
        })
    }
}

impl ActiveGroupRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a group unless its room hosts an unterminated, overlapping session.
    ///
    /// Returns `Ok(None)` when the room is occupied.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create_if_room_free(
        &self,
        group: &NewActiveGroup,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveGroup>> {
        let start = encode_ts(group.start_time);
        let end = group.end_time.map(encode_ts);
        let now = encode_ts(now);

        let result = sqlx::query(
            "INSERT INTO active_group (template_group_id, room_id, start_time, end_time)
             SELECT ?1, ?2, ?3, ?4
             WHERE NOT EXISTS (
                 SELECT 1 FROM active_group
                 WHERE room_id = ?2
                   AND (end_time IS NULL OR end_time > ?5)
                   AND (end_time IS NULL OR end_time > ?3)
                   AND (?4 IS NULL OR start_time < ?4)
             )",
        )
        .bind(group.template_group_id)
        .bind(group.room_id)
        .bind(&start)
        .bind(&end)
        .bind(&now)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .map(Some)
            .ok_or_else(|| missing_after_write("active group", id))
    }

    /// Retrieve an active group by identifier.
    ///
    /// Returns `Ok(None)` if the group does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ActiveGroup>> {
        let row: Option<ActiveGroupRow> = sqlx::query_as("SELECT * FROM active_group WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(ActiveGroupRow::into_active_group).transpose()
    }

    /// List groups matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, filter: ActiveGroupFilter, now: DateTime<Utc>) -> Result<Vec<ActiveGroup>> {
        let rows: Vec<ActiveGroupRow> = sqlx::query_as(
            "SELECT * FROM active_group
             WHERE (?1 IS NULL OR room_id = ?1)
               AND (?2 IS NULL
                    OR (?2 = 1 AND (end_time IS NULL OR end_time > ?3))
                    OR (?2 = 0 AND end_time IS NOT NULL AND end_time <= ?3))
             ORDER BY start_time DESC, id DESC",
        )
        .bind(filter.room_id)
        .bind(filter.active)
        .bind(encode_ts(now))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ActiveGroupRow::into_active_group).collect()
    }

    /// List running groups that have no active supervisor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_unclaimed(&self, now: DateTime<Utc>) -> Result<Vec<ActiveGroup>> {
        let rows: Vec<ActiveGroupRow> = sqlx::query_as(
            "SELECT g.* FROM active_group g
             WHERE (g.end_time IS NULL OR g.end_time > ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM group_supervisor s
                   WHERE s.active_group_id = g.id
                     AND (s.end_date IS NULL OR s.end_date > ?1)
               )
             ORDER BY g.start_time, g.id",
        )
        .bind(encode_ts(now))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ActiveGroupRow::into_active_group).collect()
    }

    /// Apply a room move and an optional end-time correction as one statement.
    ///
    /// A new end is only written while the group is still running at `now`.
    /// Whenever the room changes or the group stays unterminated after the
    /// write, no other unterminated session may overlap it in the target
    /// room. Returns `false` when either condition fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn update_if_room_free(
        &self,
        id: i64,
        room_id: i64,
        end_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE active_group SET room_id = ?2, end_time = COALESCE(?3, end_time)
             WHERE id = ?1
               AND (?3 IS NULL OR end_time IS NULL OR end_time > ?4)
               AND (
                   (room_id = ?2
                    AND COALESCE(?3, end_time) IS NOT NULL
                    AND COALESCE(?3, end_time) <= ?4)
                   OR NOT EXISTS (
                       SELECT 1 FROM active_group other
                       WHERE other.id != ?1
                         AND other.room_id = ?2
                         AND (other.end_time IS NULL OR other.end_time > ?4)
                         AND (other.end_time IS NULL OR other.end_time > active_group.start_time)
                         AND (COALESCE(?3, active_group.end_time) IS NULL
                              OR other.start_time < COALESCE(?3, active_group.end_time))
                   )
               )",
        )
        .bind(id)
        .bind(room_id)
        .bind(end_time.map(encode_ts))
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// End a group that is still running at `now`.
    ///
    /// Returns `false` when the group had already ended, leaving the stored
    /// end time untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn end_if_open(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE active_group SET end_time = ?2
             WHERE id = ?1 AND (end_time IS NULL OR end_time > ?2)",
        )
        .bind(id)
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a group with its closed visits, supervisors and mapping,
    /// unless it still has an open visit.
    ///
    /// Returns `false` when an open visit blocked the deletion.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn delete_if_no_open_visits(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM active_group
             WHERE id = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM visit WHERE active_group_id = ?1 AND exit_time IS NULL
               )",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for statement in [
            "DELETE FROM group_mapping WHERE active_group_id = ?1",
            "DELETE FROM group_supervisor WHERE active_group_id = ?1",
            "DELETE FROM visit WHERE active_group_id = ?1",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Count groups running at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_active(&self, now: DateTime<Utc>) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM active_group WHERE end_time IS NULL OR end_time > ?1",
        )
        .bind(encode_ts(now))
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(row.0)
    }

    /// List sessions in a room that intersect the window `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_in_room_between(
        &self,
        room_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ActiveGroup>> {
        let rows: Vec<ActiveGroupRow> = sqlx::query_as(
            "SELECT * FROM active_group
             WHERE room_id = ?1
               AND start_time < ?3
               AND (end_time IS NULL OR end_time > ?2)
             ORDER BY start_time",
        )
        .bind(room_id)
        .bind(encode_ts(from))
        .bind(encode_ts(to))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ActiveGroupRow::into_active_group).collect()
    }

    /// Running sessions with their room name and present student count.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn occupancy(&self, now: DateTime<Utc>) -> Result<Vec<RoomOccupancy>> {
        let rows: Vec<(i64, Option<String>, i64, i64)> = sqlx::query_as(
            "SELECT g.room_id, r.name, g.id,
                    (SELECT COUNT(*) FROM visit v
                     WHERE v.active_group_id = g.id AND v.exit_time IS NULL)
             FROM active_group g
             LEFT JOIN room r ON r.id = g.room_id
             WHERE g.end_time IS NULL OR g.end_time > ?1
             ORDER BY g.room_id, g.id",
        )
        .bind(encode_ts(now))
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(room_id, room_name, active_group_id, present_students)| RoomOccupancy {
                room_id,
                room_name,
                active_group_id,
                present_students,
            })
            .collect())
    }

    /// Purge groups that ended before `cutoff` and have no open visits,
    /// children first.
    ///
    /// Returns the number of groups removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn purge_ended_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff = encode_ts(cutoff);
        let mut tx = self.db.begin().await?;

        let expired = "SELECT id FROM active_group g
             WHERE g.end_time IS NOT NULL AND g.end_time < ?1
               AND NOT EXISTS (
                   SELECT 1 FROM visit v WHERE v.active_group_id = g.id AND v.exit_time IS NULL
               )";

        for table in ["group_mapping", "group_supervisor", "visit"] {
            // `table` values are compile-time literals, not user input.
            let query = format!("DELETE FROM {table} WHERE active_group_id IN ({expired})");
            sqlx::query(&query).bind(&cutoff).execute(&mut *tx).await?;
        }

        let query = format!("DELETE FROM active_group WHERE id IN ({expired})");
        let removed = sqlx::query(&query).bind(&cutoff).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(removed.rows_affected())
    }
}
