//! Session and attendance lifecycle engine.
//!
//! Each manager owns the repositories it needs and takes the current
//! instant as an explicit `now` argument; nothing below this module reads
//! the system clock.

use std::sync::Arc;

use crate::config::ExitTimePolicy;
use crate::persistence::db::Database;
use crate::{AppError, Result};
use crate::errors::ErrorKind;

pub mod active_group_manager;
pub mod analytics;
pub mod checkout_scheduler;
pub mod checkout_task;
pub mod combined_group_coordinator;
pub mod supervision_manager;
pub mod visit_tracker;

pub use active_group_manager::ActiveGroupManager;
pub use analytics::Analytics;
pub use checkout_scheduler::ScheduledCheckoutScheduler;
pub use combined_group_coordinator::CombinedGroupCoordinator;
pub use supervision_manager::SupervisionManager;
pub use visit_tracker::VisitTracker;

/// All lifecycle managers over one shared database.
#[derive(Clone)]
pub struct Engine {
    /// Room session lifecycle.
    pub groups: ActiveGroupManager,
    /// Student check-in and check-out.
    pub visits: VisitTracker,
    /// Staff assignment and claiming.
    pub supervision: SupervisionManager,
    /// Combined group membership.
    pub combined: CombinedGroupCoordinator,
    /// Deferred checkouts.
    pub checkouts: ScheduledCheckoutScheduler,
    /// Read-side projections.
    pub analytics: Analytics,
}

impl Engine {
    /// Build every manager over `db`.
    #[must_use]
    pub fn new(db: &Arc<Database>, exit_time_policy: ExitTimePolicy) -> Self {
        Self {
            groups: ActiveGroupManager::new(Arc::clone(db)),
            visits: VisitTracker::new(Arc::clone(db)),
            supervision: SupervisionManager::new(Arc::clone(db)),
            combined: CombinedGroupCoordinator::new(Arc::clone(db)),
            checkouts: ScheduledCheckoutScheduler::new(Arc::clone(db), exit_time_policy),
            analytics: Analytics::new(Arc::clone(db)),
        }
    }
}

/// Unwrap a lookup, turning absence into the given lifecycle error.
pub(crate) fn found<T>(value: Option<T>, op: &'static str, kind: ErrorKind) -> Result<T> {
    value.ok_or(AppError::Active { op, kind })
}
