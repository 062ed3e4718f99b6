//! Coordinator reassignment requests and outcomes.
//!
//! When a coordinator leaves (deactivated, or moved out of the coordinator
//! role) every active course they coordinate is handed to the default
//! coordinator:
//! 1. Look up the user's active courses
//! 2. Reassign each one that is still active and still theirs
//! 3. Complete, or fail so that a redelivery resumes the remaining courses

use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Saga type name, used as the aggregate type of saga streams.
pub const SAGA_TYPE: &str = "CoordinatorReassignment";

/// Role name that makes a user a course coordinator.
pub const COORDINATOR_ROLE: &str = "CourseCoordinator";

/// What caused a reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ReassignmentTrigger {
    UserDeactivated,
    RoleChanged {
        previous_role: String,
        new_role: String,
    },
}

impl ReassignmentTrigger {
    pub fn kind(&self) -> &'static str {
        match self {
            ReassignmentTrigger::UserDeactivated => "UserDeactivated",
            ReassignmentTrigger::RoleChanged { .. } => "RoleChanged",
        }
    }

    /// True when a role change takes the user out of the coordinator role.
    ///
    /// Role names compare case-insensitively.
    pub fn leaves_coordinator_role(previous_role: &str, new_role: &str) -> bool {
        previous_role.eq_ignore_ascii_case(COORDINATOR_ROLE)
            && !new_role.eq_ignore_ascii_case(COORDINATOR_ROLE)
    }
}

/// Input of one reassignment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignmentRequest {
    pub user_id: UserId,
    pub trigger: ReassignmentTrigger,
    /// Correlation id of the triggering integration event. Runs with the
    /// same correlation id share one saga instance.
    pub correlation_id: Uuid,
}

impl ReassignmentRequest {
    pub fn user_deactivated(user_id: UserId, correlation_id: Uuid) -> Self {
        Self {
            user_id,
            trigger: ReassignmentTrigger::UserDeactivated,
            correlation_id,
        }
    }

    pub fn role_changed(
        user_id: UserId,
        previous_role: impl Into<String>,
        new_role: impl Into<String>,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            user_id,
            trigger: ReassignmentTrigger::RoleChanged {
                previous_role: previous_role.into(),
                new_role: new_role.into(),
            },
            correlation_id,
        }
    }
}

/// Result of a successful reassignment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignmentOutcome {
    pub saga_id: AggregateId,
    /// Courses moved to the default coordinator, over all attempts.
    pub reassigned: Vec<AggregateId>,
    /// Courses that needed no change.
    pub skipped: Vec<AggregateId>,
    /// True when the saga had already completed and nothing ran.
    pub already_completed: bool,
}
