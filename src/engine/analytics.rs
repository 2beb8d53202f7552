//! Read-side projections. Nothing here writes.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::ErrorKind;
use crate::models::analytics::{Counts, Dashboard, RoomUtilization, StudentAttendance};
use crate::persistence::active_group_repo::ActiveGroupRepo;
use crate::persistence::checkout_repo::CheckoutRepo;
use crate::persistence::combined_group_repo::CombinedGroupRepo;
use crate::persistence::db::Database;
use crate::persistence::supervisor_repo::SupervisorRepo;
use crate::persistence::visit_repo::VisitRepo;
use crate::{AppError, Result};

/// Aggregations for dashboards and reports.
#[derive(Clone)]
pub struct Analytics {
    groups: ActiveGroupRepo,
    visits: VisitRepo,
    supervisors: SupervisorRepo,
    combined: CombinedGroupRepo,
    checkouts: CheckoutRepo,
}

impl Analytics {
    /// Create the projections over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            groups: ActiveGroupRepo::new(Arc::clone(&db)),
            visits: VisitRepo::new(Arc::clone(&db)),
            supervisors: SupervisorRepo::new(Arc::clone(&db)),
            combined: CombinedGroupRepo::new(Arc::clone(&db)),
            checkouts: CheckoutRepo::new(db),
        }
    }

    /// Totals at `now`.
    ///
    /// Open visits in sessions that have already ended are counted as
    /// stale, not active.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn counts(&self, now: DateTime<Utc>) -> Result<Counts> {
        let open_visits = self.visits.count_open(None).await?;
        let stale_visits = self.visits.count_stale(now).await?;
        let unclaimed = self.groups.list_unclaimed(now).await?;

        Ok(Counts {
            active_groups: self.groups.count_active(now).await?,
            active_visits: open_visits - stale_visits,
            stale_visits,
            active_supervisors: self.supervisors.count_active(None, now).await?,
            unclaimed_groups: i64::try_from(unclaimed.len()).unwrap_or(i64::MAX),
            active_combined_groups: self.combined.count_active(now).await?,
            pending_checkouts: self.checkouts.count_pending().await?,
        })
    }

    /// Totals plus the occupancy of every room with a running session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard> {
        Ok(Dashboard {
            counts: self.counts(now).await?,
            rooms: self.groups.occupancy(now).await?,
        })
    }

    /// How much of `[from, to)` the room spent hosting sessions.
    ///
    /// Running sessions count up to `now`.
    ///
    /// # Errors
    ///
    /// `InvalidTimeRange` if `to` does not follow `from`.
    pub async fn room_utilization(
        &self,
        room_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RoomUtilization> {
        if to <= from {
            return Err(AppError::active("room_utilization", ErrorKind::InvalidTimeRange));
        }

        let sessions = self.groups.list_in_room_between(room_id, from, to).await?;
        let intervals = sessions
            .iter()
            .map(|g| (g.start_time, g.end_time.unwrap_or(now)))
            .collect();
        let occupied = covered_seconds(intervals, from, to);
        let window = (to - from).num_seconds();

        Ok(RoomUtilization {
            room_id,
            from,
            to,
            sessions: sessions.len(),
            occupied_minutes: occupied / 60,
            utilization: ratio(occupied, window),
        })
    }

    /// A student's presence within `[from, to)`.
    ///
    /// # Errors
    ///
    /// `InvalidTimeRange` if `to` does not follow `from`.
    pub async fn student_attendance(
        &self,
        student_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<StudentAttendance> {
        if to <= from {
            return Err(AppError::active("student_attendance", ErrorKind::InvalidTimeRange));
        }

        let visits = self.visits.list_for_student_between(student_id, from, to).await?;
        let intervals: Vec<_> = visits
            .iter()
            .map(|v| (v.entry_time, v.exit_time.unwrap_or(now)))
            .collect();

        let days: BTreeSet<NaiveDate> = intervals
            .iter()
            .filter_map(|&(start, end)| {
                let start = start.max(from);
                let end = end.min(to);
                let last = end - chrono::Duration::microseconds(1);
                (end > start).then_some((start.date_naive(), last.date_naive()))
            })
            .flat_map(|(first, last)| first.iter_days().take_while(move |d| *d <= last))
            .collect();

        Ok(StudentAttendance {
            student_id,
            from,
            to,
            visits: visits.len(),
            total_minutes: covered_seconds(intervals, from, to) / 60,
            days_present: days.len(),
        })
    }
}

/// Seconds of `[from, to)` covered by the union of `intervals`.
fn covered_seconds(
    mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> i64 {
    intervals.sort_by_key(|&(start, _)| start);

    let mut total = 0;
    let mut cursor = from;
    for (start, end) in intervals {
        let start = start.max(cursor);
        let end = end.min(to);
        if end > start {
            total += (end - start).num_seconds();
            cursor = end;
        }
    }
    total
}

#[allow(clippy::cast_precision_loss)] // Second counts stay far below 2^52.
fn ratio(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 / whole as f64).clamp(0.0, 1.0)
}
