//! Course registration commands.

use common::{AggregateId, UserId};

use crate::command::Command;

use super::{CourseRegistration, RegistrationType};

/// Command to register a student for a course.
#[derive(Debug, Clone)]
pub struct RegisterForCourse {
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub semester_id: String,
    pub academic_year: i32,
    pub registration_type: RegistrationType,
}

impl RegisterForCourse {
    pub fn new(
        student_id: AggregateId,
        course_id: AggregateId,
        semester_id: impl Into<String>,
        academic_year: i32,
    ) -> Self {
        Self {
            student_id,
            course_id,
            semester_id: semester_id.into(),
            academic_year,
            registration_type: RegistrationType::Regular,
        }
    }

    pub fn with_type(mut self, registration_type: RegistrationType) -> Self {
        self.registration_type = registration_type;
        self
    }
}

impl Command for RegisterForCourse {
    type Aggregate = CourseRegistration;

    fn aggregate_id(&self) -> AggregateId {
        CourseRegistration::id_for(self.student_id, self.course_id, &self.semester_id)
    }
}

/// Command to approve a pending registration.
#[derive(Debug, Clone, Copy)]
pub struct ApproveRegistration {
    pub registration_id: AggregateId,
    pub approved_by: UserId,
}

impl ApproveRegistration {
    pub fn new(registration_id: AggregateId, approved_by: UserId) -> Self {
        Self {
            registration_id,
            approved_by,
        }
    }
}

impl Command for ApproveRegistration {
    type Aggregate = CourseRegistration;

    fn aggregate_id(&self) -> AggregateId {
        self.registration_id
    }
}

/// Command to reject a pending registration.
#[derive(Debug, Clone)]
pub struct RejectRegistration {
    pub registration_id: AggregateId,
    pub reason: String,
}

impl RejectRegistration {
    pub fn new(registration_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            registration_id,
            reason: reason.into(),
        }
    }
}

impl Command for RejectRegistration {
    type Aggregate = CourseRegistration;

    fn aggregate_id(&self) -> AggregateId {
        self.registration_id
    }
}

/// Command to cancel a registration.
#[derive(Debug, Clone, Copy)]
pub struct CancelRegistration {
    pub registration_id: AggregateId,
}

impl CancelRegistration {
    pub fn new(registration_id: AggregateId) -> Self {
        Self { registration_id }
    }
}

impl Command for CancelRegistration {
    type Aggregate = CourseRegistration;

    fn aggregate_id(&self) -> AggregateId {
        self.registration_id
    }
}

/// Command to mark an approved registration completed.
#[derive(Debug, Clone, Copy)]
pub struct CompleteRegistration {
    pub registration_id: AggregateId,
}

impl CompleteRegistration {
    pub fn new(registration_id: AggregateId) -> Self {
        Self { registration_id }
    }
}

impl Command for CompleteRegistration {
    type Aggregate = CourseRegistration;

    fn aggregate_id(&self) -> AggregateId {
        self.registration_id
    }
}
