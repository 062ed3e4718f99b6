//! Integration events: the messages services exchange over the bus.

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, DepartmentId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message on the shared bus.
///
/// Serialized as one flat JSON object:
///
/// ```json
/// {"correlation_id": "...", "occurred_on": "...", "event_type": "UserCreated", "user_id": "...", ...}
/// ```
///
/// For events translated from this workspace's stores, `correlation_id` is
/// the id of the stored event, so a republished message keeps its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub correlation_id: Uuid,
    pub occurred_on: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: IntegrationPayload,
}

impl IntegrationEvent {
    /// Wraps a payload under a fresh correlation id.
    pub fn new(payload: IntegrationPayload) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            occurred_on: Utc::now(),
            payload,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn occurred_on(mut self, occurred_on: DateTime<Utc>) -> Self {
        self.occurred_on = occurred_on;
        self
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Bus routing key: the event type in kebab case, e.g. `user-created`.
    pub fn routing_key(&self) -> String {
        routing_key(self.event_type())
    }
}

/// Converts an event type name to its routing key.
///
/// `"CourseRegistrationCreated"` becomes `"course-registration-created"`.
pub fn routing_key(event_type: &str) -> String {
    let mut key = String::with_capacity(event_type.len() + 4);
    for (i, c) in event_type.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                key.push('-');
            }
            key.push(c.to_ascii_lowercase());
        } else {
            key.push(c);
        }
    }
    key
}

/// Whether a seat was taken or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentChange {
    Enrolled,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrerequisiteChange {
    Added,
    Removed,
}

/// Event body, tagged by `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum IntegrationPayload {
    // Produced by the authentication service.
    UserCreated {
        user_id: UserId,
        email: String,
        first_name: String,
        last_name: String,
        user_type: String,
        created_at: DateTime<Utc>,
    },
    UserUpdated {
        user_id: UserId,
        email: String,
        first_name: String,
        last_name: String,
        user_type: String,
        /// What changed: "Profile", "Role", "Status", ...
        update_type: String,
        updated_at: DateTime<Utc>,
    },
    UserDeactivated {
        user_id: UserId,
        email: String,
        user_type: String,
        deactivated_at: DateTime<Utc>,
    },
    UserRoleChanged {
        user_id: UserId,
        email: String,
        previous_role: String,
        new_role: String,
        changed_at: DateTime<Utc>,
    },

    // Course catalog.
    DepartmentCreated {
        department_id: DepartmentId,
        code: String,
        name: String,
        description: String,
        head_of_department_id: UserId,
        created_at: DateTime<Utc>,
    },
    DepartmentUpdated {
        department_id: DepartmentId,
        code: String,
        name: String,
        description: String,
        head_of_department_id: UserId,
        updated_at: DateTime<Utc>,
    },
    DepartmentDeactivated {
        department_id: DepartmentId,
        code: String,
        name: String,
        deactivated_at: DateTime<Utc>,
    },
    CourseCreated {
        course_id: AggregateId,
        course_code: String,
        title: String,
        description: String,
        credits: u32,
        department_id: DepartmentId,
        coordinator_id: UserId,
        max_capacity: u32,
        is_borrowable: bool,
        semester: String,
        academic_year: i32,
        prerequisites: Vec<AggregateId>,
    },
    CourseUpdated {
        course_id: AggregateId,
        course_code: String,
        title: String,
        description: String,
        credits: u32,
    },
    CourseEnrollmentChanged {
        course_id: AggregateId,
        course_code: String,
        change: EnrollmentChange,
        current_enrollment: u32,
        max_capacity: u32,
        available_slots: u32,
    },
    CourseCapacityUpdated {
        course_id: AggregateId,
        course_code: String,
        max_capacity: u32,
        current_enrollment: u32,
        available_slots: u32,
    },
    CourseFull {
        course_id: AggregateId,
        course_code: String,
        title: String,
        max_capacity: u32,
    },
    CourseCoordinatorReassigned {
        course_id: AggregateId,
        course_code: String,
        previous_coordinator_id: UserId,
        new_coordinator_id: UserId,
    },
    CoursePrerequisitesChanged {
        course_id: AggregateId,
        course_code: String,
        change: PrerequisiteChange,
        prerequisite_id: AggregateId,
    },
    CourseDeactivated {
        course_id: AggregateId,
        course_code: String,
        title: String,
    },

    // Registration.
    CourseRegistrationCreated {
        registration_id: AggregateId,
        student_id: AggregateId,
        course_id: AggregateId,
        semester_id: String,
        academic_year: i32,
        registration_type: String,
        registered_at: DateTime<Utc>,
    },
    CourseRegistrationApproved {
        registration_id: AggregateId,
        student_id: AggregateId,
        course_id: AggregateId,
        approved_by: UserId,
        approved_at: DateTime<Utc>,
    },
    CourseRegistrationRejected {
        registration_id: AggregateId,
        student_id: AggregateId,
        course_id: AggregateId,
        reason: String,
    },
    CourseRegistrationCancelled {
        registration_id: AggregateId,
        student_id: AggregateId,
        course_id: AggregateId,
    },
    CourseRegistrationCompleted {
        registration_id: AggregateId,
        student_id: AggregateId,
        course_id: AggregateId,
    },

    // Student academic records.
    StudentCreated {
        student_id: AggregateId,
        student_number: String,
        user_id: UserId,
        department_id: DepartmentId,
        program: String,
        enrollment_date: NaiveDate,
        expected_graduation_date: NaiveDate,
    },
    GradeSubmitted {
        student_id: AggregateId,
        course_id: AggregateId,
        credits: u32,
        grade: String,
        semester: String,
        academic_year: i32,
    },
    CgpaUpdated {
        student_id: AggregateId,
        old_cgpa: f64,
        new_cgpa: f64,
    },
    StudentStatusChanged {
        student_id: AggregateId,
        old_status: String,
        new_status: String,
        reason: String,
    },
}

impl IntegrationPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            IntegrationPayload::UserCreated { .. } => "UserCreated",
            IntegrationPayload::UserUpdated { .. } => "UserUpdated",
            IntegrationPayload::UserDeactivated { .. } => "UserDeactivated",
            IntegrationPayload::UserRoleChanged { .. } => "UserRoleChanged",
            IntegrationPayload::DepartmentCreated { .. } => "DepartmentCreated",
            IntegrationPayload::DepartmentUpdated { .. } => "DepartmentUpdated",
            IntegrationPayload::DepartmentDeactivated { .. } => "DepartmentDeactivated",
            IntegrationPayload::CourseCreated { .. } => "CourseCreated",
            IntegrationPayload::CourseUpdated { .. } => "CourseUpdated",
            IntegrationPayload::CourseEnrollmentChanged { .. } => "CourseEnrollmentChanged",
            IntegrationPayload::CourseCapacityUpdated { .. } => "CourseCapacityUpdated",
            IntegrationPayload::CourseFull { .. } => "CourseFull",
            IntegrationPayload::CourseCoordinatorReassigned { .. } => {
                "CourseCoordinatorReassigned"
            }
            IntegrationPayload::CoursePrerequisitesChanged { .. } => "CoursePrerequisitesChanged",
            IntegrationPayload::CourseDeactivated { .. } => "CourseDeactivated",
            IntegrationPayload::CourseRegistrationCreated { .. } => "CourseRegistrationCreated",
            IntegrationPayload::CourseRegistrationApproved { .. } => "CourseRegistrationApproved",
            IntegrationPayload::CourseRegistrationRejected { .. } => "CourseRegistrationRejected",
            IntegrationPayload::CourseRegistrationCancelled { .. } => {
                "CourseRegistrationCancelled"
            }
            IntegrationPayload::CourseRegistrationCompleted { .. } => {
                "CourseRegistrationCompleted"
            }
            IntegrationPayload::StudentCreated { .. } => "StudentCreated",
            IntegrationPayload::GradeSubmitted { .. } => "GradeSubmitted",
            IntegrationPayload::CgpaUpdated { .. } => "CgpaUpdated",
            IntegrationPayload::StudentStatusChanged { .. } => "StudentStatusChanged",
        }
    }
}
