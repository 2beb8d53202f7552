//! Domain model module declarations.

use chrono::{DateTime, Utc};

pub mod active_group;
pub mod analytics;
pub mod checkout;
pub mod combined_group;
pub mod directory;
pub mod supervisor;
pub mod visit;

/// Whether an interval with the given optional end is still running at `now`.
///
/// An absent end means open-ended; an end in the future has not yet passed.
#[must_use]
pub fn is_open(end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    end.is_none_or(|end| end > now)
}
