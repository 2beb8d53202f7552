//! Combined group and group mapping repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::is_unique_violation;
use crate::models::combined_group::{CombinedGroup, GroupMapping};
use crate::Result;

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_ts, missing_after_write};

/// Repository wrapper around `SQLite` for combined groups and their mappings.
#[derive(Clone)]
pub struct CombinedGroupRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct CombinedGroupRow {
    id: i64,
    start_time: String,
    end_time: Option<String>,
}

impl CombinedGroupRow {
    fn into_combined_group(self) -> Result<CombinedGroup> {
        Ok(CombinedGroup {
            id: self.id,
            start_time: decode_ts("start_time", &self.start_time)?,
            end_time: decode_opt_ts("end_time", self.end_time.as_deref())?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MappingRow {
    id: i64,
    active_group_id: i64,
    combined_group_id: i64,
}

impl From<MappingRow> for GroupMapping {
    fn from(row: MappingRow) -> Self {
        Self {
            id: row.id,
            active_group_id: row.active_group_id,
            combined_group_id: row.combined_group_id,
        }
    }
}

impl CombinedGroupRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a combined group.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(
        &self,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<CombinedGroup> {
        let result = sqlx::query("INSERT INTO combined_group (start_time, end_time) VALUES (?1, ?2)")
            .bind(encode_ts(start_time))
            .bind(end_time.map(encode_ts))
            .execute(self.db.as_ref())
            .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| missing_after_write("combined group", id))
    }

    /// Retrieve a combined group by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<CombinedGroup>> {
        let row: Option<CombinedGroupRow> =
            sqlx::query_as("SELECT * FROM combined_group WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(CombinedGroupRow::into_combined_group).transpose()
    }

    /// List combined groups, optionally only those running at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, active_at: Option<DateTime<Utc>>) -> Result<Vec<CombinedGroup>> {
        let rows: Vec<CombinedGroupRow> = sqlx::query_as(
            "SELECT * FROM combined_group
             WHERE ?1 IS NULL OR end_time IS NULL OR end_time > ?1
             ORDER BY start_time DESC, id DESC",
        )
        .bind(active_at.map(encode_ts))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(CombinedGroupRow::into_combined_group).collect()
    }

    /// Correct start and, while the combination is running, its end.
    ///
    /// An end is never rewritten once the combination has ended by `now`.
    /// A combination that stays running must not share a member with any
    /// other combination running at `now`. Returns `false` when either
    /// condition fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn update_if_members_free(
        &self,
        id: i64,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE combined_group SET start_time = ?2, end_time = COALESCE(?3, end_time)
             WHERE id = ?1
               AND (?3 IS NULL OR end_time IS NULL OR end_time > ?4)
               AND (
                   (COALESCE(?3, end_time) IS NOT NULL AND COALESCE(?3, end_time) <= ?4)
                   OR NOT EXISTS (
                       SELECT 1 FROM group_mapping m
                       JOIN group_mapping o
                         ON o.active_group_id = m.active_group_id
                        AND o.combined_group_id != m.combined_group_id
                       JOIN combined_group c ON c.id = o.combined_group_id
                       WHERE m.combined_group_id = ?1
                         AND (c.end_time IS NULL OR c.end_time > ?4)
                   )
               )",
        )
        .bind(id)
        .bind(encode_ts(start_time))
        .bind(end_time.map(encode_ts))
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// End a combined group still running at `now`.
    ///
    /// Returns `false` when it had already ended.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn end_if_open(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE combined_group SET end_time = ?2
             WHERE id = ?1 AND (end_time IS NULL OR end_time > ?2)",
        )
        .bind(id)
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a combined group and its mappings.
    ///
    /// Returns `false` if the group did not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM group_mapping WHERE combined_group_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM combined_group WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Map an active group running at `now` into a combined group unless it
    /// already belongs to a combined group running at `now`.
    ///
    /// Returns `Ok(None)` when the active group is already combined or has
    /// ended.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails for another reason.
    pub async fn add_mapping_if_free(
        &self,
        combined_group_id: i64,
        active_group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<GroupMapping>> {
        let outcome = sqlx::query(
            "INSERT INTO group_mapping (active_group_id, combined_group_id)
             SELECT ?1, ?2
             WHERE NOT EXISTS (
                 SELECT 1 FROM group_mapping m
                 JOIN combined_group c ON c.id = m.combined_group_id
                 WHERE m.active_group_id = ?1
                   AND (m.combined_group_id = ?2 OR c.end_time IS NULL OR c.end_time > ?3)
             )
               AND EXISTS (
                 SELECT 1 FROM active_group
                 WHERE id = ?1 AND (end_time IS NULL OR end_time > ?3)
             )",
        )
        .bind(active_group_id)
        .bind(combined_group_id)
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
        Ok(Some(GroupMapping {
            id: result.last_insert_rowid(),
            active_group_id,
            combined_group_id,
        }))
    }

    /// Remove a mapping.
    ///
    /// Returns `false` if no such mapping existed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn remove_mapping(&self, combined_group_id: i64, active_group_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM group_mapping WHERE combined_group_id = ?1 AND active_group_id = ?2",
        )
        .bind(combined_group_id)
        .bind(active_group_id)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List the mappings of a combined group.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn mappings(&self, combined_group_id: i64) -> Result<Vec<GroupMapping>> {
        let rows: Vec<MappingRow> = sqlx::query_as(
            "SELECT * FROM group_mapping WHERE combined_group_id = ?1 ORDER BY id",
        )
        .bind(combined_group_id)
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(rows.into_iter().map(GroupMapping::from).collect())
    }

    /// Count combined groups running at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_active(&self, now: DateTime<Utc>) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM combined_group WHERE end_time IS NULL OR end_time > ?1",
        )
        .bind(encode_ts(now))
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(row.0)
    }
}
