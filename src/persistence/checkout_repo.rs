//! Scheduled checkout repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::checkout::{CheckoutStatus, NewScheduledCheckout, ScheduledCheckout};
use crate::{AppError, Result};

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_ts, missing_after_write};

/// Repository wrapper around `SQLite` for scheduled checkout records.
#[derive(Clone)]
pub struct CheckoutRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct CheckoutRow {
    id: i64,
    student_id: i64,
    scheduled_by: i64,
    scheduled_for: String,
    reason: Option<String>,
    status: String,
    created_at: String,
    executed_at: Option<String>,
    cancelled_at: Option<String>,
    cancelled_by: Option<i64>,
}

impl CheckoutRow {
    fn into_checkout(self) -> Result<ScheduledCheckout> {
        Ok(ScheduledCheckout {
            id: self.id,
            student_id: self.student_id,
            scheduled_by: self.scheduled_by,
            scheduled_for: decode_ts("scheduled_for", &self.scheduled_for)?,
            reason: self.reason,
            status: parse_status(&self.status)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            executed_at: decode_opt_ts("executed_at", self.executed_at.as_deref())?,
            cancelled_at: decode_opt_ts("cancelled_at", self.cancelled_at.as_deref())?,
            cancelled_by: self.cancelled_by,
        })
    }
}

fn parse_status(s: &str) -> Result<CheckoutStatus> {
    match s {
        "pending" => Ok(CheckoutStatus::Pending),
        "executed" => Ok(CheckoutStatus::Executed),
        "cancelled" => Ok(CheckoutStatus::Cancelled),
        other => Err(AppError::Db(format!("invalid checkout status: {other}"))),
    }
}

/// Effect of executing one due checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutExecution {
    /// The student's open visit was closed.
    VisitClosed {
        /// Visit that received an exit time.
        visit_id: i64,
    },
    /// The student had no open visit; the checkout was still marked executed.
    NoOpenVisit,
    /// Another run already moved the record out of `pending`.
    AlreadyProcessed,
}

impl CheckoutRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new pending checkout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(
        &self,
        checkout: &NewScheduledCheckout,
        now: DateTime<Utc>,
    ) -> Result<ScheduledCheckout> {
        let result = sqlx::query(
            "INSERT INTO scheduled_checkout (student_id, scheduled_by, scheduled_for, reason,
             status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        )
        .bind(checkout.student_id)
        .bind(checkout.scheduled_by)
        .bind(encode_ts(checkout.scheduled_for))
        .bind(&checkout.reason)
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| missing_after_write("scheduled checkout", id))
    }

    /// Retrieve a checkout by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ScheduledCheckout>> {
        let row: Option<CheckoutRow> =
            sqlx::query_as("SELECT * FROM scheduled_checkout WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(CheckoutRow::into_checkout).transpose()
    }

    /// List all checkouts of a student, newest schedule first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<ScheduledCheckout>> {
        let rows: Vec<CheckoutRow> = sqlx::query_as(
            "SELECT * FROM scheduled_checkout WHERE student_id = ?1
             ORDER BY scheduled_for DESC, id DESC",
        )
        .bind(student_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(CheckoutRow::into_checkout).collect()
    }

    /// List a student's pending checkouts, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_pending_for_student(&self, student_id: i64) -> Result<Vec<ScheduledCheckout>> {
        let rows: Vec<CheckoutRow> = sqlx::query_as(
            "SELECT * FROM scheduled_checkout WHERE student_id = ?1 AND status = 'pending'
             ORDER BY scheduled_for, id",
        )
        .bind(student_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(CheckoutRow::into_checkout).collect()
    }

    /// List pending checkouts due at or before `now`, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledCheckout>> {
        let rows: Vec<CheckoutRow> = sqlx::query_as(
            "SELECT * FROM scheduled_checkout
             WHERE status = 'pending' AND scheduled_for <= ?1
             ORDER BY scheduled_for, id",
        )
        .bind(encode_ts(now))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(CheckoutRow::into_checkout).collect()
    }

    /// Cancel a checkout that is still pending.
    ///
    /// Returns `false` when it had already left `pending`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn cancel_if_pending(&self, id: i64, cancelled_by: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_checkout
             SET status = 'cancelled', cancelled_at = ?3, cancelled_by = ?2
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .bind(cancelled_by)
        .bind(encode_ts(now))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Execute one due checkout as a single transaction.
    ///
    /// Moves the record from `pending` to `executed` and closes the
    /// student's open visit with `exit_time`, clamped so it never precedes
    /// the visit's entry. Nothing is written if any step fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn execute(
        &self,
        checkout: &ScheduledCheckout,
        exit_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutExecution> {
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query(
            "UPDATE scheduled_checkout SET status = 'executed', executed_at = ?2
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(checkout.id)
        .bind(encode_ts(now))
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CheckoutExecution::AlreadyProcessed);
        }

        let open: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM visit WHERE student_id = ?1 AND exit_time IS NULL LIMIT 1")
                .bind(checkout.student_id)
                .fetch_optional(&mut *tx)
                .await?;

        let execution = if let Some((visit_id,)) = open {
            sqlx::query(
                "UPDATE visit SET exit_time = MAX(entry_time, ?2)
                 WHERE id = ?1 AND exit_time IS NULL",
            )
            .bind(visit_id)
            .bind(encode_ts(exit_time))
            .execute(&mut *tx)
            .await?;
            CheckoutExecution::VisitClosed { visit_id }
        } else {
            CheckoutExecution::NoOpenVisit
        };

        tx.commit().await?;
        Ok(execution)
    }

    /// Count pending checkouts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_pending(&self) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scheduled_checkout WHERE status = 'pending'")
                .fetch_one(self.db.as_ref())
                .await?;
        Ok(row.0)
    }
}
