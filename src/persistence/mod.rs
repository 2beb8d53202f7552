//! Persistence layer modules.
//!
//! Every write whose precondition depends on other rows (room occupancy,
//! one open visit per student, one open supervision per staff/group pair,
//! unclaimed groups, combined group membership) is a single conditional
//! statement, so the check and the write cannot interleave with another
//! writer. Partial unique indexes back the open-row invariants.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

pub mod active_group_repo;
pub mod checkout_repo;
pub mod combined_group_repo;
pub mod db;
pub mod directory_repo;
pub mod schema;
pub mod supervisor_repo;
pub mod visit_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Encode a timestamp as fixed-width RFC 3339 UTC text.
///
/// Fixed width keeps lexicographic comparison in SQL chronological.
#[must_use]
pub fn encode_ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp column.
pub(crate) fn decode_ts(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {column}: {e}")))
}

/// Decode a nullable stored timestamp column.
pub(crate) fn decode_opt_ts(column: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| decode_ts(column, s)).transpose()
}

/// Storage error for a row that vanished right after being written.
pub(crate) fn missing_after_write(entity: &str, id: i64) -> AppError {
    AppError::Db(format!("{entity} {id} missing after write"))
}
