//! Student, staff and room lookups.
//!
//! Identity is owned elsewhere; these tables are a read model the engine
//! consults for existence checks and display joins. The upsert methods
//! are how the owning system (or a test) keeps them populated.

use std::sync::Arc;

use crate::models::directory::{Room, Staff, Student};
use crate::Result;

use super::db::Database;

/// Repository wrapper around `SQLite` for directory records.
#[derive(Clone)]
pub struct DirectoryRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: i64,
    first_name: String,
    last_name: String,
    school_class: Option<String>,
}

#[derive(sqlx::FromRow)]
struct StaffRow {
    id: i64,
    first_name: String,
    last_name: String,
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: i64,
    name: String,
}

impl DirectoryRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Look up a student.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_student(&self, id: i64) -> Result<Option<Student>> {
        let row: Option<StudentRow> = sqlx::query_as("SELECT * FROM student WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        Ok(row.map(|r| Student {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            school_class: r.school_class,
        }))
    }

    /// Look up a staff member.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_staff(&self, id: i64) -> Result<Option<Staff>> {
        let row: Option<StaffRow> = sqlx::query_as("SELECT * FROM staff WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        Ok(row.map(|r| Staff {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
        }))
    }

    /// Look up a room.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_room(&self, id: i64) -> Result<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as("SELECT * FROM room WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        Ok(row.map(|r| Room { id: r.id, name: r.name }))
    }

    /// Insert or replace a student.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_student(&self, student: &Student) -> Result<()> {
        sqlx::query(
            "INSERT INTO student (id, first_name, last_name, school_class) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET first_name = excluded.first_name,
                 last_name = excluded.last_name, school_class = excluded.school_class",
        )
        .bind(student.id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.school_class)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Insert or replace a staff member.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_staff(&self, staff: &Staff) -> Result<()> {
        sqlx::query(
            "INSERT INTO staff (id, first_name, last_name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET first_name = excluded.first_name,
                 last_name = excluded.last_name",
        )
        .bind(staff.id)
        .bind(&staff.first_name)
        .bind(&staff.last_name)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Insert or replace a room.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_room(&self, room: &Room) -> Result<()> {
        sqlx::query(
            "INSERT INTO room (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(room.id)
        .bind(&room.name)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }
}
