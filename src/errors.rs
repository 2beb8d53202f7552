//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Classification of domain failures raised by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Active group does not exist.
    ActiveGroupNotFound,
    /// Visit does not exist.
    VisitNotFound,
    /// Group supervisor assignment does not exist.
    SupervisorNotFound,
    /// Combined group does not exist.
    CombinedGroupNotFound,
    /// Active group is not mapped into the combined group.
    GroupMappingNotFound,
    /// Student is unknown to the directory.
    StudentNotFound,
    /// Staff member is unknown to the directory.
    StaffNotFound,
    /// Scheduled checkout does not exist.
    ScheduledCheckoutNotFound,
    /// Active group has already ended.
    ActiveGroupAlreadyEnded,
    /// Visit has already been checked out.
    VisitAlreadyEnded,
    /// Supervision has already ended.
    SupervisionAlreadyEnded,
    /// Combined group has already ended.
    CombinedGroupAlreadyEnded,
    /// Student already holds an open visit.
    StudentAlreadyActive,
    /// Staff member already supervises the group.
    StaffAlreadySupervising,
    /// Active group already belongs to a combined group.
    GroupAlreadyInCombination,
    /// Student is already checked into this group.
    ///
    /// Part of the public taxonomy; check-in reports the broader
    /// [`ErrorKind::StudentAlreadyActive`] for both cases.
    StudentAlreadyInGroup,
    /// Active group still has open visits.
    CannotDeleteActiveGroup,
    /// End of an interval does not come after its start.
    InvalidTimeRange,
    /// Scheduled checkout was already executed or cancelled.
    CheckoutNotPending,
    /// Room already hosts an overlapping active session.
    RoomConflict,
}

/// Coarse grouping of [`ErrorKind`] used for transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    /// Referenced entity is missing.
    NotFound,
    /// Terminated entity cannot be terminated again.
    AlreadyEnded,
    /// Operation would violate a lifecycle invariant.
    StateConflict,
    /// Contention over an exclusive resource.
    RoomConflict,
}

impl ErrorKind {
    /// Family this kind belongs to.
    #[must_use]
    pub fn family(self) -> ErrorFamily {
        match self {
            Self::ActiveGroupNotFound
            | Self::VisitNotFound
            | Self::SupervisorNotFound
            | Self::CombinedGroupNotFound
            | Self::GroupMappingNotFound
            | Self::StudentNotFound
            | Self::StaffNotFound
            | Self::ScheduledCheckoutNotFound => ErrorFamily::NotFound,
            Self::ActiveGroupAlreadyEnded
            | Self::VisitAlreadyEnded
            | Self::SupervisionAlreadyEnded
            | Self::CombinedGroupAlreadyEnded => ErrorFamily::AlreadyEnded,
            Self::StudentAlreadyActive
            | Self::StaffAlreadySupervising
            | Self::GroupAlreadyInCombination
            | Self::StudentAlreadyInGroup
            | Self::CannotDeleteActiveGroup
            | Self::InvalidTimeRange
            | Self::CheckoutNotPending => ErrorFamily::StateConflict,
            Self::RoomConflict => ErrorFamily::RoomConflict,
        }
    }

    /// Human-readable description of the failure.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::ActiveGroupNotFound => "active group not found",
            Self::VisitNotFound => "visit not found",
            Self::SupervisorNotFound => "group supervisor not found",
            Self::CombinedGroupNotFound => "combined group not found",
            Self::GroupMappingNotFound => "group mapping not found",
            Self::StudentNotFound => "student not found",
            Self::StaffNotFound => "staff member not found",
            Self::ScheduledCheckoutNotFound => "scheduled checkout not found",
            Self::ActiveGroupAlreadyEnded => "active group already ended",
            Self::VisitAlreadyEnded => "visit already ended",
            Self::SupervisionAlreadyEnded => "supervision already ended",
            Self::CombinedGroupAlreadyEnded => "combined group already ended",
            Self::StudentAlreadyActive => "student already has an active visit",
            Self::StaffAlreadySupervising => "staff member already supervising this group",
            Self::GroupAlreadyInCombination => "active group already in a combined group",
            Self::StudentAlreadyInGroup => "student already in this group",
            Self::CannotDeleteActiveGroup => "cannot delete active group with active visits",
            Self::InvalidTimeRange => "end time must be after start time",
            Self::CheckoutNotPending => "scheduled checkout is no longer pending",
            Self::RoomConflict => "room already hosts an active session",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Lifecycle rule violation tagged with the failing operation.
    Active {
        /// Operation that raised the error, e.g. `"check_in"`.
        op: &'static str,
        /// What went wrong.
        kind: ErrorKind,
    },
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Malformed or missing input field.
    InvalidData(String),
    /// Caller identity is missing or invalid.
    Unauthorized(String),
    /// Caller is known but lacks rights for the action.
    Forbidden(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Build a tagged lifecycle error.
    #[must_use]
    pub fn active(op: &'static str, kind: ErrorKind) -> Self {
        Self::Active { op, kind }
    }

    /// Lifecycle error kind, if this is a domain failure.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Active { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether this error is the given lifecycle kind.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active { op, kind } => write!(f, "{op}: {kind}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

/// Whether a storage error is a unique-constraint violation.
///
/// Used to surface races lost at the index level as domain conflicts.
#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
