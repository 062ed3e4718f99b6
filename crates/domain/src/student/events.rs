//! Student domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, DepartmentId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Cgpa, Grade, StudentNumber, StudentStatus};

/// Events that can occur on a student record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StudentEvent {
    StudentCreated(StudentCreatedData),
    GradeSubmitted(GradeSubmittedData),
    CgpaUpdated(CgpaUpdatedData),
    StatusChanged(StatusChangedData),
}

impl DomainEvent for StudentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StudentEvent::StudentCreated(_) => "StudentCreated",
            StudentEvent::GradeSubmitted(_) => "GradeSubmitted",
            StudentEvent::CgpaUpdated(_) => "CgpaUpdated",
            StudentEvent::StatusChanged(_) => "StatusChanged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentCreatedData {
    pub student_id: AggregateId,
    pub student_number: StudentNumber,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub program: String,
    pub enrollment_date: NaiveDate,
    pub expected_graduation_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeSubmittedData {
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub credits: u32,
    pub grade: Grade,
    pub semester: String,
    pub academic_year: i32,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CgpaUpdatedData {
    pub student_id: AggregateId,
    pub old_cgpa: Cgpa,
    pub new_cgpa: Cgpa,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub student_id: AggregateId,
    pub old_status: StudentStatus,
    pub new_status: StudentStatus,
    pub reason: String,
}
