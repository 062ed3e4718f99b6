//! Course domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, DepartmentId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{CourseCode, Semester};

/// Events that can occur on a course aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CourseEvent {
    /// Course was created with its full definition.
    CourseCreated(CourseCreatedData),

    /// Title, description or credits changed.
    CourseUpdated(CourseUpdatedData),

    StudentEnrolled(EnrollmentChangedData),

    StudentDropped(EnrollmentChangedData),

    /// Enrollment reached capacity.
    CourseFull(CourseFullData),

    CapacityUpdated(CapacityUpdatedData),

    CoordinatorReassigned(CoordinatorReassignedData),

    PrerequisiteAdded(PrerequisiteChangedData),

    PrerequisiteRemoved(PrerequisiteChangedData),

    CourseDeactivated(CourseDeactivatedData),
}

impl DomainEvent for CourseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CourseEvent::CourseCreated(_) => "CourseCreated",
            CourseEvent::CourseUpdated(_) => "CourseUpdated",
            CourseEvent::StudentEnrolled(_) => "StudentEnrolled",
            CourseEvent::StudentDropped(_) => "StudentDropped",
            CourseEvent::CourseFull(_) => "CourseFull",
            CourseEvent::CapacityUpdated(_) => "CapacityUpdated",
            CourseEvent::CoordinatorReassigned(_) => "CoordinatorReassigned",
            CourseEvent::PrerequisiteAdded(_) => "PrerequisiteAdded",
            CourseEvent::PrerequisiteRemoved(_) => "PrerequisiteRemoved",
            CourseEvent::CourseDeactivated(_) => "CourseDeactivated",
        }
    }
}

/// Data for CourseCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseCreatedData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub title: String,
    pub description: String,
    pub credits: u32,
    pub department_id: DepartmentId,
    pub coordinator_id: UserId,
    pub max_capacity: u32,
    pub is_borrowable: bool,
    pub offering_semester: Semester,
    pub academic_year: i32,
    #[serde(default)]
    pub prerequisites: Vec<AggregateId>,
    pub created_at: DateTime<Utc>,
}

/// Data for CourseUpdated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseUpdatedData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub title: String,
    pub description: String,
    pub credits: u32,
}

/// Data for StudentEnrolled and StudentDropped events.
///
/// Carries the enrollment after the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentChangedData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub current_enrollment: u32,
    pub max_capacity: u32,
}

/// Data for CourseFull event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseFullData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub title: String,
    pub max_capacity: u32,
}

/// Data for CapacityUpdated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityUpdatedData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub max_capacity: u32,
    pub current_enrollment: u32,
}

/// Data for CoordinatorReassigned event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorReassignedData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub previous_coordinator_id: UserId,
    pub new_coordinator_id: UserId,
}

/// Data for PrerequisiteAdded and PrerequisiteRemoved events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisiteChangedData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub prerequisite_id: AggregateId,
}

/// Data for CourseDeactivated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDeactivatedData {
    pub course_id: AggregateId,
    pub course_code: CourseCode,
    pub title: String,
}

impl CourseEvent {
    /// Id of the course the event belongs to.
    pub fn course_id(&self) -> AggregateId {
        match self {
            CourseEvent::CourseCreated(d) => d.course_id,
            CourseEvent::CourseUpdated(d) => d.course_id,
            CourseEvent::StudentEnrolled(d) | CourseEvent::StudentDropped(d) => d.course_id,
            CourseEvent::CourseFull(d) => d.course_id,
            CourseEvent::CapacityUpdated(d) => d.course_id,
            CourseEvent::CoordinatorReassigned(d) => d.course_id,
            CourseEvent::PrerequisiteAdded(d) | CourseEvent::PrerequisiteRemoved(d) => d.course_id,
            CourseEvent::CourseDeactivated(d) => d.course_id,
        }
    }
}
