//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so this runs
//! on every server startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table and index definitions to the connected database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS student (
    id              INTEGER PRIMARY KEY NOT NULL,
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    school_class    TEXT
);

CREATE TABLE IF NOT EXISTS staff (
    id              INTEGER PRIMARY KEY NOT NULL,
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS room (
    id              INTEGER PRIMARY KEY NOT NULL,
    name            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS active_group (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    template_group_id   INTEGER NOT NULL,
    room_id             INTEGER NOT NULL,
    start_time          TEXT NOT NULL,
    end_time            TEXT
);

CREATE TABLE IF NOT EXISTS visit (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id      INTEGER NOT NULL,
    active_group_id INTEGER NOT NULL,
    entry_time      TEXT NOT NULL,
    exit_time       TEXT,
    checked_in_by   INTEGER
);

CREATE TABLE IF NOT EXISTS group_supervisor (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    staff_id        INTEGER NOT NULL,
    active_group_id INTEGER NOT NULL,
    role            TEXT NOT NULL,
    start_date      TEXT NOT NULL,
    end_date        TEXT
);

CREATE TABLE IF NOT EXISTS combined_group (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time      TEXT NOT NULL,
    end_time        TEXT
);

CREATE TABLE IF NOT EXISTS group_mapping (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    active_group_id     INTEGER NOT NULL,
    combined_group_id   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS scheduled_checkout (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id      INTEGER NOT NULL,
    scheduled_by    INTEGER NOT NULL,
    scheduled_for   TEXT NOT NULL,
    reason          TEXT,
    status          TEXT NOT NULL CHECK(status IN ('pending','executed','cancelled')),
    created_at      TEXT NOT NULL,
    executed_at     TEXT,
    cancelled_at    TEXT,
    cancelled_by    INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS ux_visit_open_student
    ON visit(student_id) WHERE exit_time IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS ux_supervisor_open_pair
    ON group_supervisor(staff_id, active_group_id) WHERE end_date IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS ux_mapping_pair
    ON group_mapping(active_group_id, combined_group_id);

CREATE INDEX IF NOT EXISTS idx_active_group_room ON active_group(room_id);
CREATE INDEX IF NOT EXISTS idx_visit_group ON visit(active_group_id);
CREATE INDEX IF NOT EXISTS idx_supervisor_group ON group_supervisor(active_group_id);
CREATE INDEX IF NOT EXISTS idx_supervisor_staff ON group_supervisor(staff_id);
CREATE INDEX IF NOT EXISTS idx_mapping_combined ON group_mapping(combined_group_id);
CREATE INDEX IF NOT EXISTS idx_checkout_status_due ON scheduled_checkout(status, scheduled_for);
CREATE INDEX IF NOT EXISTS idx_checkout_student ON scheduled_checkout(student_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
