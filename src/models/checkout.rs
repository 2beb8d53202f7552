//! Scheduled checkout model and batch processing report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status for a scheduled checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// Waiting for its due time.
    Pending,
    /// Processed by the batch.
    Executed,
    /// Withdrawn by staff.
    Cancelled,
}

impl CheckoutStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A deferred check-out request for a student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ScheduledCheckout {
    /// Unique record identifier.
    pub id: i64,
    /// Student to check out.
    pub student_id: i64,
    /// Staff member who scheduled it.
    pub scheduled_by: i64,
    /// Due instant.
    pub scheduled_for: DateTime<Utc>,
    /// Optional reason, e.g. `pickup`.
    pub reason: Option<String>,
    /// Current lifecycle status.
    pub status: CheckoutStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the batch executed it.
    pub executed_at: Option<DateTime<Utc>>,
    /// When it was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Staff member who cancelled it.
    pub cancelled_by: Option<i64>,
}

/// Input for scheduling a checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NewScheduledCheckout {
    /// Student to check out.
    pub student_id: i64,
    /// Scheduling staff member.
    pub scheduled_by: i64,
    /// Due instant.
    pub scheduled_for: DateTime<Utc>,
    /// Optional reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// What happened to one due checkout during a batch run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// The record moved to `executed`. `visit_id` is absent when the
    /// student had no open visit left to close.
    Executed,
    /// Another run already moved the record out of `pending`.
    Skipped,
    /// Processing failed; the record stays pending.
    Failed,
}

/// Per-item result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutItemResult {
    /// Scheduled checkout processed.
    pub checkout_id: i64,
    /// Student concerned.
    pub student_id: i64,
    /// Result for this item.
    pub outcome: CheckoutOutcome,
    /// Visit closed, when one was.
    pub visit_id: Option<i64>,
    /// Explanation for skips, failures and executions without a visit.
    pub detail: Option<String>,
}

/// Aggregate result of processing due checkouts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessDueReport {
    /// Pending records due at call time.
    pub candidates: usize,
    /// Records this run moved to `executed`, with or without a visit to close.
    pub executed: usize,
    /// Records already taken by a concurrent run.
    pub skipped: usize,
    /// Records that failed and remain pending.
    pub failed: usize,
    /// `true` when no item failed.
    pub success: bool,
    /// Per-item details.
    pub items: Vec<CheckoutItemResult>,
}

impl ProcessDueReport {
    /// Record one item and keep counters consistent.
    pub fn push(&mut self, item: CheckoutItemResult) {
        match item.outcome {
            CheckoutOutcome::Executed => self.executed += 1,
            CheckoutOutcome::Skipped => self.skipped += 1,
            CheckoutOutcome::Failed => self.failed += 1,
        }
        self.items.push(item);
        self.success = self.failed == 0;
    }

    /// Whether some, but not all, candidates failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.failed > 0 && self.failed < self.candidates
    }

    /// Whether every candidate failed.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.candidates > 0 && self.failed == self.candidates
    }
}
