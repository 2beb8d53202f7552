//! Deferred checkouts and their batch execution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::config::ExitTimePolicy;
use crate::errors::ErrorKind;
use crate::models::checkout::{
    CheckoutItemResult, CheckoutOutcome, NewScheduledCheckout, ProcessDueReport, ScheduledCheckout,
};
use crate::persistence::checkout_repo::{CheckoutExecution, CheckoutRepo};
use crate::persistence::db::Database;
use crate::persistence::directory_repo::DirectoryRepo;
use crate::{AppError, Result};

use super::found;

/// Schedules checkouts and executes the due ones.
#[derive(Clone)]
pub struct ScheduledCheckoutScheduler {
    checkouts: CheckoutRepo,
    directory: DirectoryRepo,
    exit_time_policy: ExitTimePolicy,
}

impl ScheduledCheckoutScheduler {
    /// Create a scheduler over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>, exit_time_policy: ExitTimePolicy) -> Self {
        Self {
            checkouts: CheckoutRepo::new(Arc::clone(&db)),
            directory: DirectoryRepo::new(db),
            exit_time_policy,
        }
    }

    /// Record a pending checkout.
    ///
    /// # Errors
    ///
    /// `StudentNotFound` or `StaffNotFound`.
    #[instrument(skip(self, checkout), fields(student_id = checkout.student_id, scheduled_by = checkout.scheduled_by))]
    pub async fn schedule(&self, checkout: &NewScheduledCheckout, now: DateTime<Utc>) -> Result<ScheduledCheckout> {
        if self.directory.get_student(checkout.student_id).await?.is_none() {
            return Err(AppError::active("schedule_checkout", ErrorKind::StudentNotFound));
        }
        if self.directory.get_staff(checkout.scheduled_by).await?.is_none() {
            return Err(AppError::active("schedule_checkout", ErrorKind::StaffNotFound));
        }

        let created = self.checkouts.create(checkout, now).await?;
        info!(checkout_id = created.id, scheduled_for = %created.scheduled_for, "checkout scheduled");
        Ok(created)
    }

    /// Cancel a pending checkout.
    ///
    /// # Errors
    ///
    /// `ScheduledCheckoutNotFound`, or `CheckoutNotPending` once it was
    /// executed or cancelled.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64, cancelled_by: i64, now: DateTime<Utc>) -> Result<ScheduledCheckout> {
        let current = self.get(id).await?;
        if current.status.is_terminal() || !self.checkouts.cancel_if_pending(id, cancelled_by, now).await? {
            return Err(AppError::active("cancel_checkout", ErrorKind::CheckoutNotPending));
        }
        info!(checkout_id = id, cancelled_by, "checkout cancelled");
        self.get(id).await
    }

    /// Fetch a scheduled checkout.
    ///
    /// # Errors
    ///
    /// `ScheduledCheckoutNotFound` if it does not exist.
    pub async fn get(&self, id: i64) -> Result<ScheduledCheckout> {
        found(
            self.checkouts.get_by_id(id).await?,
            "get_checkout",
            ErrorKind::ScheduledCheckoutNotFound,
        )
    }

    /// All checkouts of a student.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<ScheduledCheckout>> {
        self.checkouts.list_for_student(student_id).await
    }

    /// A student's pending checkouts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn pending_for_student(&self, student_id: i64) -> Result<Vec<ScheduledCheckout>> {
        self.checkouts.list_pending_for_student(student_id).await
    }

    /// Execute every pending checkout due at `now`.
    ///
    /// Each record is processed on its own. A failure leaves that record
    /// pending for the next run and does not stop the batch; a record
    /// picked up by a concurrent run is reported as skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` only if the due records cannot be listed.
    #[instrument(skip(self))]
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<ProcessDueReport> {
        let due = self.checkouts.list_due(now).await?;
        let mut report = ProcessDueReport {
            candidates: due.len(),
            success: true,
            ..ProcessDueReport::default()
        };

        for checkout in &due {
            report.push(self.execute_one(checkout, now).await);
        }

        if report.candidates > 0 {
            info!(
                candidates = report.candidates,
                executed = report.executed,
                skipped = report.skipped,
                failed = report.failed,
                "processed due checkouts"
            );
        }
        Ok(report)
    }

    async fn execute_one(&self, checkout: &ScheduledCheckout, now: DateTime<Utc>) -> CheckoutItemResult {
        let exit_time = match self.exit_time_policy {
            ExitTimePolicy::Scheduled => checkout.scheduled_for,
            ExitTimePolicy::Processed => now,
        };

        let mut item = CheckoutItemResult {
            checkout_id: checkout.id,
            student_id: checkout.student_id,
            outcome: CheckoutOutcome::Executed,
            visit_id: None,
            detail: None,
        };

        match self.checkouts.execute(checkout, exit_time, now).await {
            Ok(CheckoutExecution::VisitClosed { visit_id }) => {
                info!(checkout_id = checkout.id, student_id = checkout.student_id, visit_id, "scheduled checkout executed");
                item.visit_id = Some(visit_id);
            }
            Ok(CheckoutExecution::NoOpenVisit) => {
                warn!(checkout_id = checkout.id, student_id = checkout.student_id, "no open visit for scheduled checkout");
                item.detail = Some("student has no active visit".into());
            }
            Ok(CheckoutExecution::AlreadyProcessed) => {
                item.outcome = CheckoutOutcome::Skipped;
                item.detail = Some("already processed".into());
            }
            Err(err) => {
                error!(checkout_id = checkout.id, %err, "scheduled checkout failed");
                item.outcome = CheckoutOutcome::Failed;
                item.detail = Some("checkout execution failed".into());
            }
        }
        item
    }
}
