//! Denormalised fields attached to responses.
//!
//! Lookups here are best effort: a failed directory read drops the field
//! instead of failing a request whose write already succeeded.

use serde::Serialize;
use tracing::warn;

use crate::models::active_group::ActiveGroup;
use crate::models::supervisor::GroupSupervisor;
use crate::models::visit::Visit;
use crate::persistence::directory_repo::DirectoryRepo;
use crate::Result;

fn best_effort<T>(field: &'static str, lookup: Result<Option<T>>) -> Option<T> {
    lookup.unwrap_or_else(|err| {
        warn!(field, %err, "display lookup failed");
        None
    })
}

/// Active group with label and room name.
#[derive(Debug, Serialize)]
pub struct ActiveGroupView {
    /// The session.
    #[serde(flatten)]
    pub group: ActiveGroup,
    /// `"Group #<template_group_id>"`.
    pub group_label: String,
    /// Room name, when known.
    pub room_name: Option<String>,
}

impl ActiveGroupView {
    /// Attach display fields to `group`.
    pub async fn load(directory: &DirectoryRepo, group: ActiveGroup) -> Self {
        let room_name = best_effort("room_name", directory.get_room(group.room_id).await).map(|r| r.name);
        Self {
            group_label: group.label(),
            room_name,
            group,
        }
    }
}

/// Visit with the student's name.
#[derive(Debug, Serialize)]
pub struct VisitView {
    /// The visit.
    #[serde(flatten)]
    pub visit: Visit,
    /// Student full name, when known.
    pub student_name: Option<String>,
}

impl VisitView {
    /// Attach display fields to `visit`.
    pub async fn load(directory: &DirectoryRepo, visit: Visit) -> Self {
        let student_name =
            best_effort("student_name", directory.get_student(visit.student_id).await).map(|s| s.full_name());
        Self { visit, student_name }
    }
}

/// Supervisor assignment with the staff member's name.
#[derive(Debug, Serialize)]
pub struct SupervisorView {
    /// The assignment.
    #[serde(flatten)]
    pub supervisor: GroupSupervisor,
    /// Staff full name, when known.
    pub staff_name: Option<String>,
}

impl SupervisorView {
    /// Attach display fields to `supervisor`.
    pub async fn load(directory: &DirectoryRepo, supervisor: GroupSupervisor) -> Self {
        let staff_name =
            best_effort("staff_name", directory.get_staff(supervisor.staff_id).await).map(|s| s.full_name());
        Self { supervisor, staff_name }
    }
}
