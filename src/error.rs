//! Error types
//!
//! `PlanError` carries business-rule outcomes as values. Only `NotFound`,
//! `MalformedRoute` and `PlanClosed` indicate a caller or integration bug.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Which vehicle resource ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapacityResource {
    Seats,
    WheelchairSlots,
}

impl CapacityResource {
    pub const fn as_str(self) -> &'static str {
        match self {
            CapacityResource::Seats => "seats",
            CapacityResource::WheelchairSlots => "wheelchair slots",
        }
    }
}

impl fmt::Display for CapacityResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Prerequisite {
    Vehicle,
    Driver,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::Vehicle => f.write_str("vehicle"),
            Prerequisite::Driver => f.write_str("driver"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Plan,
    Point,
    Schedule,
    Route,
    Vehicle,
    Driver,
    Session,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Plan => "plan",
            EntityKind::Point => "stop point",
            EntityKind::Schedule => "schedule",
            EntityKind::Route => "route",
            EntityKind::Vehicle => "vehicle",
            EntityKind::Driver => "driver",
            EntityKind::Session => "session",
        };
        f.write_str(name)
    }
}

/// Outcome of a rejected planning operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum PlanError {
    #[error("capacity exceeded: {required} {resource} needed, {available} available")]
    CapacityExceeded {
        resource: CapacityResource,
        required: u32,
        available: u32,
    },
    #[error("drop-off of {child_name} would precede the pickup")]
    OrderingViolation { schedule_id: Uuid, child_name: String },
    #[error("no {what} assigned")]
    MissingPrerequisite { what: Prerequisite },
    #[error("schedule {schedule_id} is already assigned to plan {plan_id}")]
    DuplicateAssignment { schedule_id: Uuid, plan_id: Uuid },
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },
    #[error("backend request failed: {message}")]
    PersistenceFailure { message: String },
    #[error("malformed route: {reason}")]
    MalformedRoute { reason: String },
    #[error("plan {plan_id} is no longer open")]
    PlanClosed { plan_id: Uuid },
}

impl PlanError {
    pub const fn not_found(kind: EntityKind, id: Uuid) -> Self {
        PlanError::NotFound { kind, id }
    }

    /// Expected, recoverable outcome that is shown to the user
    pub const fn is_business_rule(&self) -> bool {
        matches!(
            self,
            PlanError::CapacityExceeded { .. }
                | PlanError::OrderingViolation { .. }
                | PlanError::MissingPrerequisite { .. }
                | PlanError::DuplicateAssignment { .. }
                | PlanError::PersistenceFailure { .. }
        )
    }

    /// Error code used in NATS error replies
    pub const fn code(&self) -> &'static str {
        match self {
            PlanError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            PlanError::OrderingViolation { .. } => "ORDERING_VIOLATION",
            PlanError::MissingPrerequisite { .. } => "MISSING_PREREQUISITE",
            PlanError::DuplicateAssignment { .. } => "DUPLICATE_ASSIGNMENT",
            PlanError::NotFound { .. } => "NOT_FOUND",
            PlanError::PersistenceFailure { .. } => "PERSISTENCE_FAILURE",
            PlanError::MalformedRoute { .. } => "MALFORMED_ROUTE",
            PlanError::PlanClosed { .. } => "PLAN_CLOSED",
        }
    }
}

/// Errors from the backend collaborator
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected backend payload: {0}")]
    Decode(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<BackendError> for PlanError {
    fn from(err: BackendError) -> Self {
        PlanError::PersistenceFailure {
            message: err.to_string(),
        }
    }
}
