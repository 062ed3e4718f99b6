//! Events recorded by the reassignment saga.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::DomainEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reassignment::ReassignmentTrigger;

/// Bookkeeping events of a reassignment saga.
///
/// These stay inside the course catalog: they are persisted for resumption
/// and never published to other services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    SagaStarted(SagaStartedData),

    /// A redelivered trigger picked the saga up again.
    SagaResumed(SagaResumedData),

    /// The courses the user coordinated when the saga looked them up.
    CoursesIdentified(CoursesIdentifiedData),

    CourseReassigned(CourseReassignedData),

    /// The course needed no change: it was inactive or already moved.
    CourseSkipped(CourseSkippedData),

    /// Reassigning one course failed; a resume retries it.
    StepFailed(StepFailedData),

    SagaCompleted(SagaCompletedData),

    SagaFailed(SagaFailedData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::SagaResumed(_) => "SagaResumed",
            SagaEvent::CoursesIdentified(_) => "CoursesIdentified",
            SagaEvent::CourseReassigned(_) => "CourseReassigned",
            SagaEvent::CourseSkipped(_) => "CourseSkipped",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: AggregateId,
    pub user_id: UserId,
    pub trigger: ReassignmentTrigger,
    /// Correlation id of the integration event that triggered the saga.
    pub correlation_id: Uuid,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaResumedData {
    /// 2 for the first resume, 3 for the next one.
    pub attempt: u32,
    pub resumed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursesIdentifiedData {
    pub course_ids: Vec<AggregateId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseReassignedData {
    pub course_id: AggregateId,
    pub previous_coordinator_id: UserId,
    pub new_coordinator_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSkippedData {
    pub course_id: AggregateId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    pub course_id: AggregateId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaCompletedData {
    pub reassigned: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl SagaEvent {
    pub fn saga_started(
        saga_id: AggregateId,
        user_id: UserId,
        trigger: ReassignmentTrigger,
        correlation_id: Uuid,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            user_id,
            trigger,
            correlation_id,
            started_at: Utc::now(),
        })
    }

    pub fn saga_resumed(attempt: u32) -> Self {
        SagaEvent::SagaResumed(SagaResumedData {
            attempt,
            resumed_at: Utc::now(),
        })
    }

    pub fn courses_identified(course_ids: Vec<AggregateId>) -> Self {
        SagaEvent::CoursesIdentified(CoursesIdentifiedData { course_ids })
    }

    pub fn course_reassigned(
        course_id: AggregateId,
        previous_coordinator_id: UserId,
        new_coordinator_id: UserId,
    ) -> Self {
        SagaEvent::CourseReassigned(CourseReassignedData {
            course_id,
            previous_coordinator_id,
            new_coordinator_id,
        })
    }

    pub fn course_skipped(course_id: AggregateId, reason: impl Into<String>) -> Self {
        SagaEvent::CourseSkipped(CourseSkippedData {
            course_id,
            reason: reason.into(),
        })
    }

    pub fn step_failed(course_id: AggregateId, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            course_id,
            error: error.into(),
        })
    }

    pub fn saga_completed(reassigned: usize) -> Self {
        SagaEvent::SagaCompleted(SagaCompletedData {
            reassigned,
            completed_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
