//! Background task executing due checkouts and purging old sessions.
//!
//! Each tick runs the checkout batch (when enabled) and, if
//! `retention.days > 0`, removes sessions that ended before the cutoff
//! together with their mappings, supervisors and closed visits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use crate::config::GlobalConfig;
use crate::persistence::active_group_repo::ActiveGroupRepo;
use crate::persistence::db::Database;
use crate::Result;

use super::checkout_scheduler::ScheduledCheckoutScheduler;

/// Spawn the periodic checkout and retention task.
///
/// The task stops when `cancel` fires.
#[must_use]
pub fn spawn_checkout_task(
    db: Arc<Database>,
    config: &GlobalConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let scheduler = ScheduledCheckoutScheduler::new(Arc::clone(&db), config.scheduler.exit_time_policy);
    let groups = ActiveGroupRepo::new(db);
    let process_checkouts = config.scheduler.enabled;
    let retention_days = config.retention.days;
    let period = config.scheduler.interval();

    tokio::spawn(
        async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("checkout task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = Utc::now();
                        if process_checkouts {
                            if let Err(err) = scheduler.process_due(now).await {
                                error!(%err, "scheduled checkout batch failed");
                            }
                        }
                        if retention_days > 0 {
                            if let Err(err) = purge(&groups, retention_days, now).await {
                                error!(%err, "retention purge failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(tracing::info_span!("checkout_task")),
    )
}

async fn purge(groups: &ActiveGroupRepo, retention_days: u32, now: DateTime<Utc>) -> Result<()> {
    let cutoff = now - chrono::Duration::days(i64::from(retention_days));
    let removed = groups.purge_ended_before(cutoff).await?;
    if removed > 0 {
        info!(retention_days, removed, "retention purge completed");
    }
    Ok(())
}
